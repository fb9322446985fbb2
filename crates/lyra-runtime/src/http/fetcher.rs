//! Resilient fetcher: per-class timeouts plus bounded exponential retry.

use backon::Retryable;
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{FetchError, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, ResponseCache};
use crate::config::HttpConfig;

/// Outbound HTTP with retry.
///
/// Retryable statuses and network failures (timeouts, refused or reset
/// connections) are retried until `max_attempts` is reached. Anything else
/// fails on the first attempt. The fetcher holds no mutable state besides
/// the response cache, which is safe for concurrent use.
#[derive(Clone)]
pub struct ResilientFetcher {
    transport: Arc<dyn HttpTransport>,
    config: Arc<HttpConfig>,
    cache: ResponseCache,
}

impl ResilientFetcher {
    /// Fetcher over a real `reqwest` transport.
    pub fn new(config: HttpConfig) -> Self {
        Self::with_transport(Arc::new(ReqwestTransport::new()), config)
    }

    pub fn with_transport(transport: Arc<dyn HttpTransport>, config: HttpConfig) -> Self {
        let cache = ResponseCache::new(config.cache_capacity);
        Self {
            transport,
            config: Arc::new(config),
            cache,
        }
    }

    /// Forget bodies cached by earlier runs. Clones share the cache, so
    /// one call clears it for every client built on this fetcher.
    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
    }

    /// Send `request` using the timeouts of `class`.
    ///
    /// Returns the first 2xx response. After the last attempt the error
    /// keeps its original kind: a timeout stays a timeout.
    pub async fn fetch(&self, request: &HttpRequest, class: &str) -> Result<HttpResponse, FetchError> {
        let policy = &self.config.retry;
        let timeouts = self.config.timeouts_for(class);
        let attempts = AtomicU32::new(0);

        let outcome = (|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            self.attempt(request, timeouts).await
        })
        .retry(policy.backoff())
        .sleep(tokio::time::sleep)
        .when(|e| self.is_retryable(e))
        .notify(|e, delay| {
            warn!(
                url = %request.url,
                class,
                attempt = attempts.load(Ordering::SeqCst),
                max_attempts = policy.max_attempts,
                delay = ?delay,
                error = %e,
                "Request failed, retrying"
            );
        })
        .await;

        let attempts = attempts.load(Ordering::SeqCst);
        match &outcome {
            Ok(response) if attempts > 1 => info!(
                url = %request.url,
                status = response.status,
                attempts,
                "Request succeeded after retry"
            ),
            Ok(response) => debug!(url = %request.url, status = response.status, "Request succeeded"),
            Err(e) => error!(
                url = %request.url,
                class,
                attempts,
                status = e.status(),
                error = %e,
                "Request failed"
            ),
        }
        outcome
    }

    /// GET and decode a JSON body. Successful bodies are cached.
    pub async fn get_json(&self, request: &HttpRequest, class: &str) -> Result<Value, FetchError> {
        if let Some(cached) = self.cache.get(request).await {
            debug!(url = %request.url, "Response cache hit");
            return Ok(cached);
        }
        let response = self.fetch(request, class).await?;
        let body = decode(request, &response)?;
        self.cache.insert(request, body.clone()).await;
        Ok(body)
    }

    /// POST a JSON body and decode the JSON reply. Never cached.
    pub async fn post_json(&self, request: &HttpRequest, class: &str) -> Result<Value, FetchError> {
        let response = self.fetch(request, class).await?;
        decode(request, &response)
    }

    async fn attempt(
        &self,
        request: &HttpRequest,
        timeouts: crate::config::TimeoutPair,
    ) -> Result<HttpResponse, FetchError> {
        let response = self
            .transport
            .send(request, timeouts)
            .await
            .map_err(|e| FetchError::from_transport(request, e))?;

        if response.is_success() {
            Ok(response)
        } else {
            Err(FetchError::Http {
                method: request.method.as_str(),
                url: request.url.clone(),
                status: response.status,
                body: response.body,
            })
        }
    }

    fn is_retryable(&self, error: &FetchError) -> bool {
        match error {
            FetchError::Http { status, .. } => self.config.retry.is_retryable_status(*status),
            FetchError::Timeout { .. } | FetchError::Connection { .. } => true,
            FetchError::Transport { .. } | FetchError::Decode { .. } => false,
        }
    }
}

impl std::fmt::Debug for ResilientFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientFetcher")
            .field("retry", &self.config.retry)
            .field("cache", &self.cache)
            .finish()
    }
}

fn decode(request: &HttpRequest, response: &HttpResponse) -> Result<Value, FetchError> {
    serde_json::from_str(&response.body).map_err(|e| FetchError::Decode {
        url: request.url.clone(),
        message: e.to_string(),
    })
}
