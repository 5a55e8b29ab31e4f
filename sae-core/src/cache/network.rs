use async_trait::async_trait;
use url::Url;

use super::types::{Request, Response};
use super::CacheError;

/// Live network access used on cache misses and during install
#[async_trait]
pub trait Network: Send + Sync {
    /// Performs the request. Resolves for any HTTP status; errors only when
    /// no response could be obtained.
    async fn fetch(&self, request: &Request) -> Result<Response, CacheError>;
}

/// reqwest-backed network; relative asset paths are resolved against `origin`
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    client: reqwest::Client,
    origin: Option<Url>,
}

impl HttpNetwork {
    pub fn new(origin: Option<&str>) -> Result<Self, CacheError> {
        let origin = origin
            .map(|o| {
                Url::parse(o).map_err(|e| CacheError::Network {
                    url: o.to_string(),
                    reason: format!("invalid origin: {}", e),
                })
            })
            .transpose()?;

        Ok(Self {
            client: reqwest::Client::new(),
            origin,
        })
    }

    /// Absolute URL for a request key
    pub fn resolve(&self, url: &str) -> Result<Url, CacheError> {
        if let Ok(absolute) = Url::parse(url) {
            return Ok(absolute);
        }

        let origin = self.origin.as_ref().ok_or_else(|| CacheError::Network {
            url: url.to_string(),
            reason: "relative URL and no origin configured".to_string(),
        })?;
        origin.join(url).map_err(|e| CacheError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, CacheError> {
        let target = self.resolve(&request.url)?;
        let network_error = |e: reqwest::Error| CacheError::Network {
            url: request.url.clone(),
            reason: e.to_string(),
        };

        let response = self
            .client
            .get(target)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(network_error)?;

        Ok(Response {
            url: request.url.clone(),
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_against_origin() {
        let network = HttpNetwork::new(Some("https://example.com/wizard/")).unwrap();
        assert_eq!(
            network.resolve("./app.js").unwrap().as_str(),
            "https://example.com/wizard/app.js"
        );
        assert_eq!(
            network.resolve("./").unwrap().as_str(),
            "https://example.com/wizard/"
        );
        assert_eq!(
            network.resolve("https://cdn.example.com/x.css").unwrap().as_str(),
            "https://cdn.example.com/x.css"
        );
    }

    #[test]
    fn test_resolve_without_origin() {
        let network = HttpNetwork::new(None).unwrap();
        assert!(matches!(
            network.resolve("./app.js"),
            Err(CacheError::Network { .. })
        ));
    }

    #[test]
    fn test_invalid_origin() {
        assert!(HttpNetwork::new(Some("not a url")).is_err());
    }
}
