//! Azure OpenAI chat-completions provider.
//!
//! Requests go through the [`ResilientFetcher`] under the `azure_openai`
//! timeout class, so rate limits (429) and 5xx replies are retried with the
//! same policy as data-source calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    secrets::{ApiCredential, CredentialSource},
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
};
use crate::config::LlmConfig;
use crate::http::{classes, HttpRequest, ResilientFetcher};

/// Environment variable holding the Azure OpenAI key.
pub const AZURE_OPENAI_API_KEY_ENV: &str = "AZURE_OPENAI_API_KEY";

pub struct AzureOpenAiProvider {
    credential: ApiCredential,
    endpoint: String,
    deployment: String,
    api_version: String,
    fetcher: ResilientFetcher,
}

impl std::fmt::Debug for AzureOpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureOpenAiProvider")
            .field("credential", &self.credential)
            .field("endpoint", &self.endpoint)
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl AzureOpenAiProvider {
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        config: &LlmConfig,
        fetcher: ResilientFetcher,
    ) -> Self {
        Self {
            credential: ApiCredential::new(
                api_key,
                CredentialSource::Programmatic,
                "Azure OpenAI API key",
            ),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            deployment: config.deployment.clone(),
            api_version: config.api_version.clone(),
            fetcher,
        }
    }

    /// Build from configuration. The key comes from `AZURE_OPENAI_API_KEY`.
    pub fn from_config(config: &LlmConfig, fetcher: ResilientFetcher) -> Result<Self, ProviderError> {
        let endpoint = config.endpoint.clone().ok_or_else(|| {
            ProviderError::NotConfigured(
                "Azure OpenAI endpoint required: set llm.endpoint or AZURE_OPENAI_ENDPOINT".to_string(),
            )
        })?;
        let credential = ApiCredential::from_env(AZURE_OPENAI_API_KEY_ENV, "Azure OpenAI API key")?;
        Ok(Self {
            credential,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            deployment: config.deployment.clone(),
            api_version: config.api_version.clone(),
            fetcher,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions",
            self.endpoint, self.deployment
        )
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[async_trait]
impl LlmProvider for AzureOpenAiProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let body = serde_json::to_value(ChatRequest {
            messages: &messages,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
        .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let request = HttpRequest::post_json(self.url(), body)
            .param("api-version", &self.api_version)
            .header("api-key", self.credential.expose())
            .header("content-type", "application/json");

        let reply = self.fetcher.post_json(&request, classes::AZURE_OPENAI).await?;
        let parsed: ChatResponse =
            serde_json::from_value(reply).map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ParseError("response has no choices".to_string()))?;
        let usage = parsed
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            usage,
            model: parsed.model.unwrap_or_else(|| config.model.clone()),
            stop_reason: choice.finish_reason,
        })
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty() && !self.endpoint.is_empty()
    }

    fn name(&self) -> &str {
        "azure_openai"
    }
}
