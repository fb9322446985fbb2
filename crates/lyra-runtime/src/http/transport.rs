//! The single network seam.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use thiserror::Error;

use super::{HttpRequest, HttpResponse, Method};
use crate::config::TimeoutPair;

/// A failure before any HTTP status was received.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("timeout: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("{0}")]
    Other(String),
}

/// Performs one request with no retries.
///
/// Any status code is a successful transport result; the fetcher decides
/// what a 4xx or 5xx means.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(
        &self,
        request: &HttpRequest,
        timeouts: TimeoutPair,
    ) -> Result<HttpResponse, TransportError>;
}

/// `reqwest` transport. Keeps one client per timeout pair.
#[derive(Default)]
pub struct ReqwestTransport {
    clients: Mutex<HashMap<TimeoutPair, reqwest::Client>>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self, timeouts: TimeoutPair) -> Result<reqwest::Client, TransportError> {
        let mut clients = self.clients.lock();
        if let Some(client) = clients.get(&timeouts) {
            return Ok(client.clone());
        }
        let client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect)
            .read_timeout(timeouts.read)
            .user_agent(concat!("lyra/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {}", e)))?;
        clients.insert(timeouts, client.clone());
        Ok(client)
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("clients", &self.clients.lock().len())
            .finish()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(
        &self,
        request: &HttpRequest,
        timeouts: TimeoutPair,
    ) -> Result<HttpResponse, TransportError> {
        let client = self.client(timeouts)?;

        let mut builder = match request.method {
            Method::Get => client.get(&request.url),
            Method::Post => client.post(&request.url),
        };
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(HttpResponse { status, body })
    }
}

fn map_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(error.to_string())
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else {
        TransportError::Other(error.to_string())
    }
}
