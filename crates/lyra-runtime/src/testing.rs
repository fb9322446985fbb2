//! Test doubles shared by the runtime's unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use crate::config::TimeoutPair;
use crate::http::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use crate::providers::{
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
};

type Scripted = Result<HttpResponse, TransportError>;

struct Route {
    fragment: String,
    responses: VecDeque<Scripted>,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub request: HttpRequest,
    pub timeouts: TimeoutPair,
    pub at: Instant,
}

/// Transport that replays scripted responses per URL fragment.
///
/// Each route pops its responses in order and repeats the last one once
/// the script runs out. Unrouted URLs answer 404.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, fragment: impl Into<String>, responses: Vec<Scripted>) -> Self {
        self.routes.lock().push(Route {
            fragment: fragment.into(),
            responses: responses.into(),
        });
        self
    }

    pub fn json(self, fragment: impl Into<String>, body: serde_json::Value) -> Self {
        self.route(fragment, vec![Ok(HttpResponse::new(200, body.to_string()))])
    }

    pub fn status(self, fragment: impl Into<String>, status: u16) -> Self {
        self.route(fragment, vec![Ok(HttpResponse::new(status, ""))])
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_matching(&self, fragment: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.request.url.contains(fragment))
            .count()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn timeouts_seen(&self) -> Vec<TimeoutPair> {
        self.calls.lock().iter().map(|c| c.timeouts).collect()
    }

    /// Time between consecutive calls.
    pub fn gaps(&self) -> Vec<Duration> {
        let calls = self.calls.lock();
        calls.windows(2).map(|w| w[1].at - w[0].at).collect()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(
        &self,
        request: &HttpRequest,
        timeouts: TimeoutPair,
    ) -> Result<HttpResponse, TransportError> {
        self.calls.lock().push(RecordedCall {
            request: request.clone(),
            timeouts,
            at: Instant::now(),
        });

        let mut routes = self.routes.lock();
        let Some(route) = routes.iter_mut().find(|r| request.url.contains(&r.fragment)) else {
            return Ok(HttpResponse::new(404, ""));
        };
        if route.responses.len() > 1 {
            route.responses.pop_front().unwrap_or_else(|| Ok(HttpResponse::new(404, "")))
        } else {
            route
                .responses
                .front()
                .cloned()
                .unwrap_or_else(|| Ok(HttpResponse::new(404, "")))
        }
    }
}

/// LLM provider that answers from a fixed script, keyed by prompt content.
///
/// Each rule matches when the system or user message contains its needle.
/// Unmatched prompts get the default reply.
pub struct MockProvider {
    rules: Vec<(String, Result<String, String>)>,
    default_reply: String,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockProvider {
    pub fn new(default_reply: impl Into<String>) -> Self {
        Self {
            rules: Vec::new(),
            default_reply: default_reply.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(mut self, needle: impl Into<String>, reply: impl Into<String>) -> Self {
        self.rules.push((needle.into(), Ok(reply.into())));
        self
    }

    pub fn fail(mut self, needle: impl Into<String>, message: impl Into<String>) -> Self {
        self.rules.push((needle.into(), Err(message.into())));
        self
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }

    pub fn prompts(&self) -> Vec<Vec<ChatMessage>> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let matched = self
            .rules
            .iter()
            .find(|(needle, _)| messages.iter().any(|m| m.content.contains(needle.as_str())))
            .map(|(_, reply)| reply.clone());
        self.prompts.lock().push(messages);

        let content = match matched {
            Some(Ok(reply)) => reply,
            Some(Err(message)) => return Err(ProviderError::HttpError(message)),
            None => self.default_reply.clone(),
        };
        Ok(CompletionResponse {
            content,
            usage: TokenUsage {
                prompt_tokens: 100,
                completion_tokens: 50,
            },
            model: config.model.clone(),
            stop_reason: Some("stop".to_string()),
        })
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Counts WARN events emitted while the guard is alive.
#[derive(Clone, Default)]
pub struct WarnCounter(Arc<AtomicUsize>);

impl WarnCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Install a thread-local subscriber that counts warnings.
pub fn capture_warnings() -> (DefaultGuard, WarnCounter) {
    let counter = WarnCounter::default();
    let subscriber = tracing_subscriber::registry().with(counter.clone());
    (tracing::subscriber::set_default(subscriber), counter)
}
