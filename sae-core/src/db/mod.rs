//! Durable storage layer for the project document
//!
//! This module provides a trait-based abstraction for slot backends, so the
//! project store can persist to a directory of JSON files, a SQLite database,
//! or memory through the same interface.

mod file_backend;
mod memory_backend;
mod migration;
mod sqlite_backend;
mod traits;

pub use file_backend::FileBackend;
pub use memory_backend::MemoryBackend;
pub use migration::copy_slot;
pub use sqlite_backend::SqliteBackend;
pub use traits::{BackendType, SlotBackend};

use anyhow::Result;
use std::path::Path;

/// Infers the backend type from a path: SQLite extensions select SQLite, anything else is a directory
pub fn infer_backend_type(path: &Path) -> BackendType {
    match path.extension().and_then(|e| e.to_str()) {
        Some("db") | Some("sqlite") | Some("sqlite3") => BackendType::Sqlite,
        _ => BackendType::File,
    }
}

/// Creates a slot backend based on the path or an explicit type
pub fn create_backend(path: &Path, backend_type: Option<BackendType>) -> Result<Box<dyn SlotBackend>> {
    let bt = backend_type.unwrap_or_else(|| infer_backend_type(path));

    match bt {
        BackendType::File => Ok(Box::new(FileBackend::new(path))),
        BackendType::Sqlite => Ok(Box::new(SqliteBackend::new(path)?)),
        BackendType::Memory => Ok(Box::new(MemoryBackend::new())),
    }
}
