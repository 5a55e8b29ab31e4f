//! File slot backend
//!
//! Each key is stored as `<dir>/<key>.json`, written through the locked
//! [`Storage`] implementation.

use anyhow::Result;
use std::path::{Path, PathBuf};

use super::traits::{validate_key, BackendType, SlotBackend};
use crate::storage::Storage;

/// Directory-backed slot store
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Creates a new file backend rooted at `dir`. The directory is created on first write.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Returns the path of the file holding `key`
    pub fn slot_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn storage(&self, key: &str) -> Result<Storage> {
        validate_key(key)?;
        Ok(Storage::new(self.slot_path(key)))
    }
}

impl SlotBackend for FileBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::File
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.dir)
    }

    fn read(&self, key: &str) -> Result<Option<String>> {
        self.storage(key)?.read()
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.storage(key)?.write(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_backend_missing_key() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path());

        assert!(backend.read("sae_app_state_v1").unwrap().is_none());
        assert!(!backend.exists("sae_app_state_v1").unwrap());
    }

    #[test]
    fn test_file_backend_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path().join("data"));

        backend.write("sae_app_state_v1", "{\"project\":{}}").unwrap();

        assert_eq!(
            backend.read("sae_app_state_v1").unwrap().as_deref(),
            Some("{\"project\":{}}")
        );
        assert!(backend.slot_path("sae_app_state_v1").exists());
    }

    #[test]
    fn test_file_backend_rejects_path_keys() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::new(temp_dir.path());

        assert!(backend.write("../escape", "{}").is_err());
        assert!(backend.read("").is_err());
    }
}
