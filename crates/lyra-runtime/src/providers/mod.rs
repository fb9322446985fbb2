//! LLM provider abstraction.
//!
//! Stages never talk to a model directly. They go through [`LlmClient`],
//! which wraps an [`LlmProvider`] with the configured completion settings
//! and records token usage for the run.
//!
//! ## Security
//!
//! Providers hold their API keys as [`ApiCredential`]s. See [`secrets`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

mod azure;
pub mod secrets;
mod usage;

pub use azure::{AzureOpenAiProvider, AZURE_OPENAI_API_KEY_ENV};
pub use secrets::{ApiCredential, CredentialSource};
pub use usage::{LlmUsage, UsageTracker};

use crate::config::LlmConfig;
use crate::http::FetchError;
use lyra_core::{FailureKind, StageFailure};

/// Errors from LLM providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Response parse error: {0}")]
    ParseError(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            ProviderError::Fetch(e) => e.failure_kind(),
            _ => FailureKind::Provider,
        }
    }
}

impl From<ProviderError> for StageFailure {
    fn from(error: ProviderError) -> Self {
        StageFailure::exception(error.failure_kind(), error.to_string())
    }
}

/// Settings for one completion request.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        LlmConfig::default().completion()
    }
}

/// A chat message for LLM completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// "system", "user" or "assistant"
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub usage: TokenUsage,
    pub model: String,
    pub stop_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Swappable LLM backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Whether the provider has what it needs to make calls.
    async fn health_check(&self) -> bool;

    fn name(&self) -> &str;
}

/// The handle stages use for reasoning calls.
#[derive(Clone)]
pub struct LlmClient {
    provider: Arc<dyn LlmProvider>,
    config: CompletionConfig,
    usage: Arc<UsageTracker>,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn LlmProvider>, config: CompletionConfig) -> Self {
        Self {
            provider,
            config,
            usage: Arc::new(UsageTracker::new()),
        }
    }

    /// Send one system instruction plus one user context; return the reply text.
    pub async fn ask(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        let response = self.provider.complete(messages, &self.config).await?;
        self.usage.record(&response.usage, &response.model);
        tracing::debug!(
            provider = self.provider.name(),
            model = %response.model,
            tokens = response.usage.total(),
            "LLM call completed"
        );
        Ok(response.content)
    }

    pub fn usage(&self) -> LlmUsage {
        self.usage.snapshot()
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .finish()
    }
}
