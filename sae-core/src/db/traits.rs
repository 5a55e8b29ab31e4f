//! Durable slot abstraction
//!
//! A slot backend is a small key-value store. The project store uses exactly
//! one key in it, holding the full serialized document.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Types of slot backends available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// One JSON file per key inside a data directory
    File,
    /// Key-value table inside a SQLite database
    Sqlite,
    /// Process memory only
    Memory,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::File => write!(f, "file"),
            BackendType::Sqlite => write!(f, "SQLite"),
            BackendType::Memory => write!(f, "memory"),
        }
    }
}

/// Core trait for durable slot backends
///
/// Writes replace the whole value of a key; there are no partial updates.
pub trait SlotBackend: Send + Sync {
    /// Returns the backend type
    fn backend_type(&self) -> BackendType;

    /// Returns the on-disk location, if any
    fn path(&self) -> Option<&Path>;

    /// Reads the value stored under `key`
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Replaces the value stored under `key`
    fn write(&self, key: &str, value: &str) -> Result<()>;

    /// Returns true if a value is stored under `key`
    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.read(key)?.is_some())
    }
}

/// Rejects keys that cannot be used as a file name
pub(crate) fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !key.starts_with('.');
    if !valid {
        anyhow::bail!("Invalid slot key: {:?}", key);
    }
    Ok(())
}
