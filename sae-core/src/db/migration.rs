//! Copying a slot between backends
//!
//! Used to move a project from the file store into SQLite (or back) without
//! touching its content.

use anyhow::{Context, Result};

use super::traits::SlotBackend;

/// Copies the raw value of `key` from `source` into `target`.
///
/// Returns false if the source has nothing stored under `key`.
pub fn copy_slot(source: &dyn SlotBackend, target: &dyn SlotBackend, key: &str) -> Result<bool> {
    let Some(value) = source
        .read(key)
        .with_context(|| format!("Failed to read slot from {} backend", source.backend_type()))?
    else {
        return Ok(false);
    };

    target
        .write(key, &value)
        .with_context(|| format!("Failed to write slot to {} backend", target.backend_type()))?;

    Ok(true)
}
