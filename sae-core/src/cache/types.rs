use serde::{Deserialize, Serialize};

/// How a request was issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// Top-level document load
    Navigate,
    /// Any sub-resource (stylesheet, script, image, ...)
    Subresource,
}

/// An intercepted request. Cache entries are keyed by `url` as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
    pub mode: RequestMode,
}

impl Request {
    pub fn navigate(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mode: RequestMode::Navigate,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mode: RequestMode::Subresource,
        }
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }
}

/// A fetched or cached response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Stored separately from the metadata on disk
    #[serde(skip)]
    pub body: Vec<u8>,
}

impl Response {
    /// A 200 response with the given body
    pub fn ok(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            url: url.into(),
            status: 200,
            status_text: "OK".to_string(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Placeholder returned when a sub-resource is neither cached nor reachable
    pub fn offline(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: 503,
            status_text: "Offline".to_string(),
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            body: b"Offline".to_vec(),
        }
    }

    pub fn with_status(mut self, status: u16, status_text: &str) -> Self {
        self.status = status;
        self.status_text = status_text.to_string();
        self
    }

    /// True for 2xx statuses
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
