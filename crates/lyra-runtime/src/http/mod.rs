//! Outbound HTTP: the resilient fetcher and its transport seam.
//!
//! Every network call in the pipeline goes through [`ResilientFetcher`],
//! which applies the per-class timeouts and the shared retry policy. The
//! actual I/O sits behind [`HttpTransport`] so tests can script responses.

mod cache;
mod fetcher;
mod transport;

pub use cache::ResponseCache;
pub use fetcher::ResilientFetcher;
pub use transport::{HttpTransport, ReqwestTransport, TransportError};

use lyra_core::{FailureKind, StageFailure};
use serde_json::Value;
use thiserror::Error;

/// Endpoint classes with their own timeout pair.
pub mod classes {
    pub const ALPHAFOLD_METADATA: &str = "alphafold_metadata";
    pub const ALPHAFOLD_STRUCTURE: &str = "alphafold_structure";
    pub const UNIPROT_SEARCH: &str = "uniprot_search";
    pub const UNIPROT_ANNOTATION: &str = "uniprot_annotation";
    pub const AZURE_OPENAI: &str = "azure_openai";
    pub const DEFAULT: &str = "default";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// One outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            params: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            params: Vec::new(),
            headers: Vec::new(),
            body: Some(body),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Cache key: method, URL and query parameters. Headers are excluded.
    pub fn cache_key(&self) -> String {
        let mut key = format!("{} {}", self.method.as_str(), self.url);
        for (k, v) in &self.params {
            key.push_str(&format!("&{}={}", k, v));
        }
        key
    }
}

/// A response with any status code.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Terminal fetch failure.
///
/// Transport failures keep their original kind after retries are
/// exhausted, so callers can tell a timeout from a refused connection
/// from an HTTP error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("{method} {url} timed out: {message}")]
    Timeout {
        method: &'static str,
        url: String,
        message: String,
    },

    #[error("{method} {url} could not connect: {message}")]
    Connection {
        method: &'static str,
        url: String,
        message: String,
    },

    #[error("{method} {url} returned HTTP {status}")]
    Http {
        method: &'static str,
        url: String,
        status: u16,
        body: String,
    },

    #[error("{method} {url} failed: {message}")]
    Transport {
        method: &'static str,
        url: String,
        message: String,
    },

    #[error("{url} returned a body that is not valid JSON: {message}")]
    Decode { url: String, message: String },
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn failure_kind(&self) -> FailureKind {
        match self {
            FetchError::Timeout { .. } => FailureKind::Timeout,
            FetchError::Connection { .. } => FailureKind::Connection,
            FetchError::Http { .. } => FailureKind::Http,
            FetchError::Transport { .. } => FailureKind::Transport,
            FetchError::Decode { .. } => FailureKind::Decode,
        }
    }

    pub(crate) fn from_transport(request: &HttpRequest, error: TransportError) -> Self {
        let method = request.method.as_str();
        let url = request.url.clone();
        match error {
            TransportError::Timeout(message) => FetchError::Timeout {
                method,
                url,
                message,
            },
            TransportError::Connect(message) => FetchError::Connection {
                method,
                url,
                message,
            },
            TransportError::Other(message) => FetchError::Transport {
                method,
                url,
                message,
            },
        }
    }
}

impl From<FetchError> for StageFailure {
    fn from(error: FetchError) -> Self {
        StageFailure::exception(error.failure_kind(), error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyra_core::ErrorSource;

    #[test]
    fn test_cache_key_includes_params() {
        let a = HttpRequest::get("https://x/search").param("query", "kinase");
        let b = HttpRequest::get("https://x/search").param("query", "receptor");
        assert_ne!(a.cache_key(), b.cache_key());
        let c = HttpRequest::get("https://x/search")
            .param("query", "kinase")
            .header("accept", "application/json");
        assert_eq!(a.cache_key(), c.cache_key());
    }

    #[test]
    fn test_fetch_error_becomes_exception() {
        let error = FetchError::Http {
            method: "GET",
            url: "https://alphafold.ebi.ac.uk/api/prediction/P04637".to_string(),
            status: 503,
            body: String::new(),
        };
        let failure = StageFailure::from(error);
        assert_eq!(failure.origin, ErrorSource::Exception);
        assert_eq!(failure.kind, FailureKind::Http);
        assert!(failure.describe().starts_with("http: GET"));
    }
}
