use async_trait::async_trait;
use sae_core::cache::{
    AssetCacheWorker, CacheConfig, CacheError, CacheStorage, ClaimedClients, DiskCacheStorage,
    Network, Registration, Request, Response, WorkerState,
};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Serves every URL with a body naming the URL, until switched off
#[derive(Default)]
struct SwitchableNetwork {
    down: AtomicBool,
}

#[async_trait]
impl Network for SwitchableNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, CacheError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(CacheError::Network {
                url: request.url.clone(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(Response::ok(request.url.as_str(), format!("served {}", request.url)))
    }
}

fn config(dir: &TempDir, version: &str) -> CacheConfig {
    CacheConfig {
        version: version.to_string(),
        dir: dir.path().to_path_buf(),
        ..CacheConfig::default()
    }
}

#[tokio::test]
async fn disk_cache_serves_offline_after_restart() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(DiskCacheStorage::new(dir.path()));
    let network = Arc::new(SwitchableNetwork::default());
    let clients = Arc::new(ClaimedClients::new());

    let mut registration = Registration::new(clients.clone(), network.clone());
    let worker = AssetCacheWorker::new(config(&dir, "v1"), storage.clone(), network.clone());
    registration.deploy(worker).await.unwrap();

    network.down.store(true, Ordering::SeqCst);

    // A fresh process picks the installed version back up
    let resumed = AssetCacheWorker::resume(config(&dir, "v1"), storage, network.clone())
        .await
        .unwrap();
    assert_eq!(resumed.state(), WorkerState::Active);

    let page = resumed
        .handle_fetch(&Request::navigate("https://wizard.local/#solution"))
        .await
        .unwrap();
    assert_eq!(page.text(), "served ./index.html");

    let script = resumed.handle_fetch(&Request::get("./app.js")).await.unwrap();
    assert_eq!(script.text(), "served ./app.js");

    let missing = resumed.handle_fetch(&Request::get("./img/plan.png")).await.unwrap();
    assert_eq!(missing.status, 503);
}

#[tokio::test]
async fn version_bump_evicts_old_cache_on_disk() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(DiskCacheStorage::new(dir.path()));
    let network = Arc::new(SwitchableNetwork::default());
    let mut registration = Registration::new(Arc::new(ClaimedClients::new()), network.clone());

    let v1 = AssetCacheWorker::new(config(&dir, "sae-pwa-cache-v1"), storage.clone(), network.clone());
    registration.deploy(v1).await.unwrap();

    let v2 = AssetCacheWorker::new(config(&dir, "sae-pwa-cache-v2"), storage.clone(), network.clone());
    let report = registration.deploy(v2).await.unwrap();

    assert_eq!(report.superseded.as_deref(), Some("sae-pwa-cache-v1"));
    assert_eq!(
        storage.keys().await.unwrap(),
        vec!["sae-pwa-cache-v2".to_string()]
    );
    assert_eq!(storage.entry_urls("sae-pwa-cache-v2").await.unwrap().len(), 5);
}

fn metadata_path(root: &Path, version: &str, url: &str) -> PathBuf {
    root.join(version)
        .join(format!("{:x}.json", Sha256::digest(url.as_bytes())))
}

fn truncate_half(path: &Path) {
    let content = std::fs::read(path).unwrap();
    std::fs::write(path, &content[..content.len() / 2]).unwrap();
}

#[tokio::test]
async fn torn_metadata_falls_back_to_network_or_offline() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(DiskCacheStorage::new(dir.path()));
    let network = Arc::new(SwitchableNetwork::default());
    let mut registration = Registration::new(Arc::new(ClaimedClients::new()), network.clone());

    let worker = AssetCacheWorker::new(config(&dir, "v1"), storage.clone(), network.clone());
    registration.deploy(worker).await.unwrap();

    truncate_half(&metadata_path(dir.path(), "v1", "./app.js"));
    truncate_half(&metadata_path(dir.path(), "v1", "./index.html"));

    // Online: the network answers and the entry is rewritten
    let script = registration.fetch(&Request::get("./app.js")).await.unwrap();
    assert_eq!(script.text(), "served ./app.js");
    assert!(storage.match_in("v1", "./app.js").await.unwrap().is_some());

    let page = registration
        .fetch(&Request::navigate("https://wizard.local/"))
        .await
        .unwrap();
    assert_eq!(page.text(), "served https://wizard.local/");

    // Offline: a torn sub-resource entry ends in the 503 placeholder
    truncate_half(&metadata_path(dir.path(), "v1", "./styles.css"));
    network.down.store(true, Ordering::SeqCst);
    let styles = registration.fetch(&Request::get("./styles.css")).await.unwrap();
    assert_eq!(styles.status, 503);

    // The healed entry is still served offline
    let script = registration.fetch(&Request::get("./app.js")).await.unwrap();
    assert_eq!(script.text(), "served ./app.js");
}

#[tokio::test]
async fn failed_install_leaves_nothing_to_resume() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(DiskCacheStorage::new(dir.path()));
    let network = Arc::new(SwitchableNetwork::default());
    network.down.store(true, Ordering::SeqCst);
    let mut registration = Registration::new(Arc::new(ClaimedClients::new()), network.clone());

    let worker = AssetCacheWorker::new(config(&dir, "v1"), storage.clone(), network.clone());
    assert!(registration.deploy(worker).await.is_err());
    assert!(!storage.has("v1").await.unwrap());

    assert!(matches!(
        AssetCacheWorker::resume(config(&dir, "v1"), storage, network).await,
        Err(CacheError::NotInstalled(_))
    ));
}
