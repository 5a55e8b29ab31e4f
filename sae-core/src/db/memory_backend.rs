//! In-memory slot backend, used by tests and for throwaway sessions

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::traits::{BackendType, SlotBackend};

/// Memory backend. Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    slots: Arc<Mutex<HashMap<String, String>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-populated with one slot
    pub fn with_slot(key: &str, value: &str) -> Self {
        let backend = Self::new();
        if let Ok(mut slots) = backend.slots.lock() {
            slots.insert(key.to_string(), value.to_string());
        }
        backend
    }

    /// Makes every subsequent write fail, simulating a full or unavailable store
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl SlotBackend for MemoryBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Memory
    }

    fn path(&self) -> Option<&Path> {
        None
    }

    fn read(&self, key: &str) -> Result<Option<String>> {
        let slots = self
            .slots
            .lock()
            .map_err(|_| anyhow!("memory slot lock poisoned"))?;
        Ok(slots.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("storage quota exceeded");
        }
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| anyhow!("memory slot lock poisoned"))?;
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
