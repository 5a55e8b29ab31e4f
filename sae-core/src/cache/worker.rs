use async_trait::async_trait;
use futures::future::try_join_all;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::network::Network;
use super::storage::CacheStorage;
use super::types::{Request, RequestMode, Response};
use super::{CacheConfig, CacheError};

/// Lifecycle of one asset cache worker.
///
/// `Parsed -> Installing -> Installed -> Activating -> Active -> Superseded`.
/// A failed install ends in `Redundant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Active,
    Superseded,
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Parsed => write!(f, "parsed"),
            WorkerState::Installing => write!(f, "installing"),
            WorkerState::Installed => write!(f, "installed"),
            WorkerState::Activating => write!(f, "activating"),
            WorkerState::Active => write!(f, "active"),
            WorkerState::Superseded => write!(f, "superseded"),
            WorkerState::Redundant => write!(f, "redundant"),
        }
    }
}

/// Open pages that an activated worker takes control of
#[async_trait]
pub trait ClientRegistry: Send + Sync {
    /// Makes `version` the controller of every open client. Returns how many were claimed.
    async fn claim(&self, version: &str) -> usize;
}

/// In-process client registry: client id -> controlling cache version
#[derive(Debug, Default)]
pub struct ClaimedClients {
    clients: RwLock<BTreeMap<String, Option<String>>>,
}

impl ClaimedClients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an open client with no controller
    pub async fn open_client(&self, id: &str) {
        self.clients.write().await.entry(id.to_string()).or_insert(None);
    }

    /// The cache version controlling `id`, if any
    pub async fn controller(&self, id: &str) -> Option<String> {
        self.clients.read().await.get(id).cloned().flatten()
    }
}

#[async_trait]
impl ClientRegistry for ClaimedClients {
    async fn claim(&self, version: &str) -> usize {
        let mut clients = self.clients.write().await;
        for controller in clients.values_mut() {
            *controller = Some(version.to_string());
        }
        clients.len()
    }
}

/// Outcome of a successful install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub version: String,
    pub assets: usize,
}

/// Outcome of a successful activation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActivationReport {
    pub version: String,
    /// Stale cache names that were deleted
    pub deleted: Vec<String>,
    pub claimed: usize,
    /// Version of the worker this activation replaced, if any
    pub superseded: Option<String>,
}

/// Serves the asset set of one deployed version.
///
/// Lifecycle transitions take `&mut self` and must be awaited to completion;
/// `handle_fetch` takes `&self` so several requests can be in flight.
pub struct AssetCacheWorker {
    config: CacheConfig,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    state: WorkerState,
}

impl AssetCacheWorker {
    pub fn new(
        config: CacheConfig,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
    ) -> Self {
        Self {
            config,
            storage,
            network,
            state: WorkerState::Parsed,
        }
    }

    /// Restarts a worker whose version was installed and activated earlier
    /// (e.g. in a previous process). Every manifest asset must be present in
    /// the version cache.
    pub async fn resume(
        config: CacheConfig,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
    ) -> Result<Self, CacheError> {
        ensure_complete(&config, storage.as_ref()).await?;
        let mut worker = Self::new(config, storage, network);
        worker.state = WorkerState::Active;
        Ok(worker)
    }

    /// Picks up a version installed earlier but not yet activated. Every
    /// manifest asset must be present in the version cache.
    pub async fn restore_installed(
        config: CacheConfig,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
    ) -> Result<Self, CacheError> {
        ensure_complete(&config, storage.as_ref()).await?;
        let mut worker = Self::new(config, storage, network);
        worker.state = WorkerState::Installed;
        Ok(worker)
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn expect_state(&self, expected: WorkerState, operation: &'static str) -> Result<(), CacheError> {
        if self.state != expected {
            return Err(CacheError::InvalidTransition {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    /// Fetches every asset of the manifest and stores them in the version cache.
    ///
    /// All assets are fetched before the cache is created; one failed fetch or
    /// non-2xx status fails the install, leaves no cache for the version and
    /// the worker `Redundant`. A successful install is ready to take over
    /// immediately.
    pub async fn install(&mut self) -> Result<InstallReport, CacheError> {
        self.expect_state(WorkerState::Parsed, "install")?;
        self.state = WorkerState::Installing;
        info!("Installing asset cache {}", self.config.version);
        let existed = self.storage.has(&self.config.version).await.unwrap_or(true);

        match self.populate().await {
            Ok(assets) => {
                self.state = WorkerState::Installed;
                debug!("Installed {} assets into {}", assets, self.config.version);
                Ok(InstallReport {
                    version: self.config.version.clone(),
                    assets,
                })
            }
            Err(e) => {
                warn!("Install of {} failed: {}", self.config.version, e);
                self.state = WorkerState::Redundant;
                // A cache that predates this install stays in place
                if !existed {
                    if let Err(cleanup) = self.storage.delete(&self.config.version).await {
                        warn!(
                            "Failed to remove partial cache {}: {}",
                            self.config.version, cleanup
                        );
                    }
                }
                Err(e)
            }
        }
    }

    async fn populate(&self) -> Result<usize, CacheError> {
        let fetches = self.config.assets.iter().map(|asset| async move {
            let response = self.network.fetch(&Request::get(asset.as_str())).await?;
            if !response.is_ok() {
                return Err(CacheError::BadStatus {
                    url: asset.clone(),
                    status: response.status,
                });
            }
            Ok::<_, CacheError>((asset.clone(), response))
        });
        let entries = try_join_all(fetches).await?;
        let count = entries.len();

        // put_all creates the cache
        self.storage.put_all(&self.config.version, entries).await?;
        Ok(count)
    }

    /// Deletes every cache not named by this version, then claims all open clients
    pub async fn activate(
        &mut self,
        clients: &dyn ClientRegistry,
    ) -> Result<ActivationReport, CacheError> {
        self.expect_state(WorkerState::Installed, "activate")?;
        self.state = WorkerState::Activating;

        match self.evict_stale().await {
            Ok(deleted) => {
                let claimed = clients.claim(&self.config.version).await;
                self.state = WorkerState::Active;
                info!(
                    "Asset cache {} active ({} stale caches deleted, {} clients claimed)",
                    self.config.version,
                    deleted.len(),
                    claimed
                );
                Ok(ActivationReport {
                    version: self.config.version.clone(),
                    deleted,
                    claimed,
                    superseded: None,
                })
            }
            Err(e) => {
                // Activation can be retried
                self.state = WorkerState::Installed;
                Err(e)
            }
        }
    }

    async fn evict_stale(&self) -> Result<Vec<String>, CacheError> {
        let mut deleted = Vec::new();
        for name in self.storage.keys().await? {
            if name != self.config.version && self.storage.delete(&name).await? {
                debug!("Deleted stale cache {}", name);
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    /// Marks an active worker as replaced by a newer version
    pub fn supersede(&mut self) {
        if self.state == WorkerState::Active {
            self.state = WorkerState::Superseded;
        }
    }

    /// Maps an intercepted request to a response.
    ///
    /// Navigation requests get the cached entry document, or the live network
    /// on a miss (network errors propagate). Other requests are cache-first; a
    /// live response is stored before being returned, and a network failure
    /// yields a synthesized 503. A storage error on lookup counts as a miss.
    ///
    /// Only 2xx responses are written back, unlike a browser service worker
    /// that caches whatever the network resolved with.
    pub async fn handle_fetch(&self, request: &Request) -> Result<Response, CacheError> {
        self.expect_state(WorkerState::Active, "handle fetch")?;

        match request.mode {
            RequestMode::Navigate => {
                match self
                    .storage
                    .match_in(&self.config.version, &self.config.entry_document)
                    .await
                {
                    Ok(Some(cached)) => return Ok(cached),
                    Ok(None) => {}
                    Err(e) => warn!(
                        "Cached {} unreadable, using network: {}",
                        self.config.entry_document, e
                    ),
                }
                self.network.fetch(request).await
            }
            RequestMode::Subresource => {
                match self.storage.match_any(&request.url).await {
                    Ok(Some(cached)) => return Ok(cached),
                    Ok(None) => {}
                    Err(e) => warn!("Cached {} unreadable, treating as miss: {}", request.url, e),
                }

                match self.network.fetch(request).await {
                    Ok(fresh) => {
                        if fresh.is_ok() {
                            if let Err(e) = self
                                .storage
                                .put(&self.config.version, &request.url, fresh.clone())
                                .await
                            {
                                warn!("Failed to cache {}: {}", request.url, e);
                            }
                        }
                        Ok(fresh)
                    }
                    Err(e) => {
                        warn!("Serving offline placeholder for {}: {}", request.url, e);
                        Ok(Response::offline(request.url.as_str()))
                    }
                }
            }
        }
    }
}

/// Fails with `NotInstalled` unless every manifest asset is in the version cache
async fn ensure_complete(config: &CacheConfig, storage: &dyn CacheStorage) -> Result<(), CacheError> {
    if !storage.has(&config.version).await? {
        return Err(CacheError::NotInstalled(config.version.clone()));
    }
    for asset in &config.assets {
        let present = match storage.match_in(&config.version, asset).await {
            Ok(found) => found.is_some(),
            Err(e) => {
                warn!("Cached {} in {} unreadable: {}", asset, config.version, e);
                false
            }
        };
        if !present {
            return Err(CacheError::NotInstalled(format!(
                "{} (missing {})",
                config.version, asset
            )));
        }
    }
    Ok(())
}

/// Holds the active worker and swaps it when a new version is deployed
pub struct Registration {
    active: Option<AssetCacheWorker>,
    clients: Arc<dyn ClientRegistry>,
    network: Arc<dyn Network>,
}

impl Registration {
    pub fn new(clients: Arc<dyn ClientRegistry>, network: Arc<dyn Network>) -> Self {
        Self {
            active: None,
            clients,
            network,
        }
    }

    /// Starts with an already active worker
    pub fn with_active(
        worker: AssetCacheWorker,
        clients: Arc<dyn ClientRegistry>,
        network: Arc<dyn Network>,
    ) -> Self {
        Self {
            active: Some(worker),
            clients,
            network,
        }
    }

    pub fn active(&self) -> Option<&AssetCacheWorker> {
        self.active.as_ref()
    }

    /// Installs `worker` and, once installed, activates it in place of the
    /// current one without waiting for it to shut down. A failed install
    /// or activation leaves the current worker in control.
    pub async fn deploy(
        &mut self,
        mut worker: AssetCacheWorker,
    ) -> Result<ActivationReport, CacheError> {
        worker.install().await?;
        let mut report = worker.activate(self.clients.as_ref()).await?;

        if let Some(mut previous) = self.active.take() {
            previous.supersede();
            report.superseded = Some(previous.version().to_string());
        }
        self.active = Some(worker);
        Ok(report)
    }

    /// Routes a request through the active worker, or straight to the network
    pub async fn fetch(&self, request: &Request) -> Result<Response, CacheError> {
        match &self.active {
            Some(worker) => worker.handle_fetch(request).await,
            None => self.network.fetch(request).await,
        }
    }
}
