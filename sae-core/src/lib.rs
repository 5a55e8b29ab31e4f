pub mod cache;
pub mod config;
pub mod db;
pub mod export;
pub mod models;
pub mod route;
pub mod storage;
pub mod store;

// Re-export commonly used types
pub use cache::{
    AssetCacheWorker, CacheConfig, CacheError, CacheStorage, DiskCacheStorage, HttpNetwork,
    MemoryCacheStorage, Network, Registration, Request, Response, WorkerState,
};
pub use config::{get_config_dir, get_config_path, AppConfig};
pub use db::{create_backend, BackendType, FileBackend, MemoryBackend, SlotBackend, SqliteBackend};
pub use export::{export_file_name, export_to_path, import_from_path, summary_markdown};
pub use models::{
    clamp_int,
    BuildingEntry,
    BuildingField,
    BuildingSection,
    Connectivity,
    ProjectDocument,
    ProjectInfo,
    SolutionProfile,
    Summary,
    // Bounds
    BUILDINGS_COUNT_MAX,
    BUILDINGS_COUNT_MIN,
    DEVICES_MAX,
    DEVICES_MIN,
    FLOORS_MAX,
    FLOORS_MIN,
    INTEGRATION_KEYS,
};
pub use route::Route;
pub use storage::Storage;
pub use store::{FieldError, FieldPath, ImportError, ProjectStore, StoreError, STORAGE_KEY};
