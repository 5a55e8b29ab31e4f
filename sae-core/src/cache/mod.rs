//! Offline asset cache
//!
//! Keeps the static asset set available without network, using one named
//! cache per deployed version. Key components:
//! - `AssetCacheWorker`: explicit install -> activate -> fetch lifecycle
//! - `CacheStorage`: named caches of responses (memory and disk implementations)
//! - `Network`: live fetches (reqwest implementation)
//! - `Registration`: swaps the active worker when a new version is deployed
//!
//! Bumping `CacheConfig::version` is the only way old caches get evicted.

mod disk;
mod network;
mod storage;
mod types;
mod worker;

pub use disk::DiskCacheStorage;
pub use network::{HttpNetwork, Network};
pub use storage::{CacheStorage, MemoryCacheStorage};
pub use types::{Request, RequestMode, Response};
pub use worker::{
    ActivationReport, AssetCacheWorker, ClaimedClients, ClientRegistry, InstallReport,
    Registration, WorkerState,
};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Cache name of the current deployment
pub const CACHE_VERSION: &str = "sae-pwa-cache-v1";

/// Entry document served for navigation requests
pub const ENTRY_DOCUMENT: &str = "./index.html";

/// Static assets required for offline operation
pub const ASSET_MANIFEST: [&str; 5] = [
    "./",
    "./index.html",
    "./styles.css",
    "./app.js",
    "./manifest.json",
];

/// Errors that can occur in the asset cache
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Network request for {url} failed: {reason}")]
    Network { url: String, reason: String },

    #[error("Fetching {url} returned status {status}")]
    BadStatus { url: String, status: u16 },

    #[error("Cannot {operation} while the worker is {state}")]
    InvalidTransition {
        operation: &'static str,
        state: WorkerState,
    },

    #[error("Cache {0} has not been installed")]
    NotInstalled(String),

    #[error("Invalid cache name: {0:?}")]
    InvalidName(String),

    #[error("Cache storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt cache entry: {0}")]
    Corrupt(String),
}

/// Asset cache settings, embedded in the application config
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheConfig {
    /// Version tag; doubles as the cache name
    #[serde(default = "default_version")]
    pub version: String,

    /// Origin that relative asset paths are resolved against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,

    /// Directory holding the on-disk caches
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_assets")]
    pub assets: Vec<String>,

    #[serde(default = "default_entry_document")]
    pub entry_document: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            origin: None,
            dir: default_cache_dir(),
            assets: default_assets(),
            entry_document: default_entry_document(),
        }
    }
}

fn default_version() -> String {
    CACHE_VERSION.to_string()
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sae")
        .join("assets")
}

fn default_assets() -> Vec<String> {
    ASSET_MANIFEST.iter().map(|s| s.to_string()).collect()
}

fn default_entry_document() -> String {
    ENTRY_DOCUMENT.to_string()
}
