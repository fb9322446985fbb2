//! In-memory cache of decoded GET responses.
//!
//! Only successful JSON bodies are stored, so a retried or failed request
//! never poisons later lookups for the same URL.

use moka::future::Cache;
use serde_json::Value;

use super::HttpRequest;

/// Decoded JSON bodies keyed by [`HttpRequest::cache_key`].
#[derive(Clone)]
pub struct ResponseCache {
    cache: Option<Cache<String, Value>>,
}

impl ResponseCache {
    /// A cache holding at most `max_entries` bodies. Zero disables caching.
    pub fn new(max_entries: u64) -> Self {
        let cache = (max_entries > 0).then(|| Cache::builder().max_capacity(max_entries).build());
        Self { cache }
    }

    pub async fn get(&self, request: &HttpRequest) -> Option<Value> {
        match &self.cache {
            Some(cache) => cache.get(&request.cache_key()).await,
            None => None,
        }
    }

    pub async fn insert(&self, request: &HttpRequest, body: Value) {
        if let Some(cache) = &self.cache {
            cache.insert(request.cache_key(), body).await;
        }
    }

    /// Drop every stored body. Later lookups miss until refilled.
    pub fn invalidate_all(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
        }
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("enabled", &self.cache.is_some())
            .finish()
    }
}
