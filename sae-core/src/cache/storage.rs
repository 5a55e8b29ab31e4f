use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::types::Response;
use super::CacheError;

/// Named caches of responses keyed by request URL.
///
/// Each individual operation is atomic; there is no cross-operation locking.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Creates the named cache if it does not exist
    async fn open(&self, name: &str) -> Result<(), CacheError>;

    /// Returns true if the named cache exists
    async fn has(&self, name: &str) -> Result<bool, CacheError>;

    /// Lists cache names in lookup order
    async fn keys(&self) -> Result<Vec<String>, CacheError>;

    /// Deletes a cache. Returns false if it did not exist.
    async fn delete(&self, name: &str) -> Result<bool, CacheError>;

    /// Looks up `url` in one cache
    async fn match_in(&self, name: &str, url: &str) -> Result<Option<Response>, CacheError>;

    /// Stores a response in the named cache, creating the cache if needed
    async fn put(&self, name: &str, url: &str, response: Response) -> Result<(), CacheError>;

    /// Lists the URLs stored in one cache
    async fn entry_urls(&self, name: &str) -> Result<Vec<String>, CacheError>;

    /// Stores several responses at once
    async fn put_all(&self, name: &str, entries: Vec<(String, Response)>) -> Result<(), CacheError> {
        for (url, response) in entries {
            self.put(name, &url, response).await?;
        }
        Ok(())
    }

    /// Looks up `url` across every cache, in `keys()` order
    async fn match_any(&self, url: &str) -> Result<Option<Response>, CacheError> {
        for name in self.keys().await? {
            if let Some(response) = self.match_in(&name, url).await? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }
}

/// In-memory cache storage. Caches are listed in creation order.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    caches: RwLock<Vec<(String, HashMap<String, Response>)>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<(), CacheError> {
        let mut caches = self.caches.write().await;
        if !caches.iter().any(|(n, _)| n == name) {
            caches.push((name.to_string(), HashMap::new()));
        }
        Ok(())
    }

    async fn has(&self, name: &str) -> Result<bool, CacheError> {
        Ok(self.caches.read().await.iter().any(|(n, _)| n == name))
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self
            .caches
            .read()
            .await
            .iter()
            .map(|(n, _)| n.clone())
            .collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        let mut caches = self.caches.write().await;
        let before = caches.len();
        caches.retain(|(n, _)| n != name);
        Ok(caches.len() != before)
    }

    async fn match_in(&self, name: &str, url: &str) -> Result<Option<Response>, CacheError> {
        Ok(self
            .caches
            .read()
            .await
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, entries)| entries.get(url).cloned()))
    }

    async fn put(&self, name: &str, url: &str, response: Response) -> Result<(), CacheError> {
        self.put_all(name, vec![(url.to_string(), response)]).await
    }

    async fn entry_urls(&self, name: &str) -> Result<Vec<String>, CacheError> {
        let caches = self.caches.read().await;
        let mut urls: Vec<String> = caches
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, entries)| entries.keys().cloned().collect())
            .unwrap_or_default();
        urls.sort();
        Ok(urls)
    }

    /// All entries land under a single write lock
    async fn put_all(&self, name: &str, entries: Vec<(String, Response)>) -> Result<(), CacheError> {
        let mut caches = self.caches.write().await;
        let index = match caches.iter().position(|(n, _)| n == name) {
            Some(index) => index,
            None => {
                caches.push((name.to_string(), HashMap::new()));
                caches.len() - 1
            }
        };
        caches[index].1.extend(entries);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let storage = MemoryCacheStorage::new();
        storage.open("v1").await.unwrap();
        storage.open("v1").await.unwrap();
        assert_eq!(storage.keys().await.unwrap(), vec!["v1".to_string()]);
    }

    #[tokio::test]
    async fn test_match_any_follows_creation_order() {
        let storage = MemoryCacheStorage::new();
        storage
            .put("old", "./app.js", Response::ok("./app.js", "old"))
            .await
            .unwrap();
        storage
            .put("new", "./app.js", Response::ok("./app.js", "new"))
            .await
            .unwrap();

        let hit = storage.match_any("./app.js").await.unwrap().unwrap();
        assert_eq!(hit.text(), "old");
        assert!(storage.match_any("./missing.js").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let storage = MemoryCacheStorage::new();
        storage.open("v1").await.unwrap();
        assert!(storage.delete("v1").await.unwrap());
        assert!(!storage.delete("v1").await.unwrap());
        assert!(!storage.has("v1").await.unwrap());
    }
}
