use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::storage::CacheStorage;
use super::types::Response;
use super::CacheError;

/// Cache storage on disk.
///
/// Each cache is a directory under `root`. An entry is two files named by
/// the SHA-256 of its URL: `<hash>.body` with the raw body and `<hash>.json`
/// with the metadata. Both are written to a temporary file and renamed into
/// place, metadata last, so an interrupted write reads as a miss or as the
/// previous entry.
#[derive(Debug, Clone)]
pub struct DiskCacheStorage {
    root: PathBuf,
}

impl DiskCacheStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn cache_dir(&self, name: &str) -> Result<PathBuf, CacheError> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(CacheError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    fn entry_stem(url: &str) -> String {
        format!("{:x}", Sha256::digest(url.as_bytes()))
    }
}

/// Writes `bytes` to `<path>.tmp` and renames it over `path`
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, CacheError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn open(&self, name: &str) -> Result<(), CacheError> {
        fs::create_dir_all(self.cache_dir(name)?).await?;
        Ok(())
    }

    async fn has(&self, name: &str) -> Result<bool, CacheError> {
        match fs::metadata(self.cache_dir(name)?).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        match fs::remove_dir_all(self.cache_dir(name)?).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn match_in(&self, name: &str, url: &str) -> Result<Option<Response>, CacheError> {
        let dir = self.cache_dir(name)?;
        let stem = Self::entry_stem(url);

        let Some(meta) = read_optional(&dir.join(format!("{}.json", stem))).await? else {
            return Ok(None);
        };
        let mut response: Response = serde_json::from_slice(&meta)
            .map_err(|e| CacheError::Corrupt(format!("{} in {}: {}", url, name, e)))?;

        response.body = read_optional(&dir.join(format!("{}.body", stem)))
            .await?
            .ok_or_else(|| CacheError::Corrupt(format!("{} in {}: missing body", url, name)))?;

        Ok(Some(response))
    }

    async fn put(&self, name: &str, url: &str, response: Response) -> Result<(), CacheError> {
        let dir = self.cache_dir(name)?;
        fs::create_dir_all(&dir).await?;

        let stem = Self::entry_stem(url);
        let meta = serde_json::to_vec_pretty(&StoredEntry {
            request_url: url,
            response: &response,
        })
        .map_err(|e| CacheError::Corrupt(e.to_string()))?;

        write_atomic(&dir.join(format!("{}.body", stem)), &response.body).await?;
        write_atomic(&dir.join(format!("{}.json", stem)), &meta).await?;
        Ok(())
    }

    async fn entry_urls(&self, name: &str) -> Result<Vec<String>, CacheError> {
        let dir = self.cache_dir(name)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut urls = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(&path).await?;
            let stored: StoredUrl = serde_json::from_slice(&bytes)
                .map_err(|e| CacheError::Corrupt(format!("{:?}: {}", path, e)))?;
            urls.push(stored.request_url);
        }
        urls.sort();
        Ok(urls)
    }
}

/// Metadata file layout: the response fields plus the request key
#[derive(serde::Serialize)]
struct StoredEntry<'a> {
    request_url: &'a str,
    #[serde(flatten)]
    response: &'a Response,
}

#[derive(serde::Deserialize)]
struct StoredUrl {
    request_url: String,
}
