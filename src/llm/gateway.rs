//! Chat gateway to the remote LLM service.
//!
//! One operation: `chat(model, messages, options)`. The gateway never
//! interprets model output — refusals come back as ordinary content and it
//! is the caller's job to parse tolerantly. Upstream/auth failures surface
//! as typed errors which the job layer maps to a user-visible message.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use super::LlmError;

/// Default request timeout for a single chat call.
const REQUEST_TIMEOUT_SECS: u64 = 120;

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }
}

/// Per-call tuning. Extraction and agents both run low temperature.
#[derive(Debug, Clone, Copy)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    pub json_mode: bool,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 4096,
            json_mode: false,
        }
    }
}

impl ChatOptions {
    /// JSON-mode options used by all structured-output callers.
    pub fn json(max_tokens: u32) -> Self {
        Self {
            temperature: 0.1,
            max_tokens,
            json_mode: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatReply {
    pub content: String,
    pub role: String,
}

/// Seam for the remote chat service. Production: `GroqClient`.
/// Tests: `MockChatClient`.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: ChatOptions,
    ) -> Result<ChatReply, LlmError>;
}

// ──────────────────────────────────────────────
// Wire format
// ──────────────────────────────────────────────

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<WireResponseFormat>,
}

#[derive(Serialize)]
struct WireResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireMessage {
    content: String,
    #[serde(default)]
    role: Option<String>,
}

// ──────────────────────────────────────────────
// GroqClient
// ──────────────────────────────────────────────

/// Production chat client against the Groq OpenAI-compatible endpoint.
pub struct GroqClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl GroqClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: Option<String>, base_url: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ChatClient for GroqClient {
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: ChatOptions,
    ) -> Result<ChatReply, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;

        let request = WireRequest {
            model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            response_format: options.json_mode.then_some(WireResponseFormat {
                kind: "json_object",
            }),
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(REQUEST_TIMEOUT_SECS)
                } else {
                    LlmError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            let mut message = message.trim().to_string();
            message.truncate(300);
            return Err(LlmError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let body: WireResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Transport(format!("malformed response body: {e}")))?;

        let choice = body.choices.into_iter().next().ok_or(LlmError::EmptyResponse)?;
        Ok(ChatReply {
            content: choice.message.content,
            role: choice.message.role.unwrap_or_else(|| "assistant".into()),
        })
    }
}

// ──────────────────────────────────────────────
// Upstream error mapping
// ──────────────────────────────────────────────

/// Map known upstream-failure messages to a clearer user-visible string.
/// Returns the original message when no known pattern matches.
pub fn map_upstream_error(message: &str) -> String {
    let lower = message.to_lowercase();
    let auth_markers = [
        "api key",
        "api_key",
        "invalid_api_key",
        "unauthorized",
        "authentication",
        "401",
    ];
    if auth_markers.iter().any(|m| lower.contains(m)) {
        return "AI service error, check API key".to_string();
    }
    message.to_string()
}

// ──────────────────────────────────────────────
// LlmGateway — semaphore-bounded entry point
// ──────────────────────────────────────────────

/// Chat entry point bounded by the global LLM semaphore.
///
/// Every gateway call acquires one permit, so the number of in-flight
/// LLM calls never exceeds the configured limit regardless of how many
/// jobs, documents, or pages fan out above it.
pub struct LlmGateway {
    client: Arc<dyn ChatClient>,
    permits: Arc<Semaphore>,
}

impl LlmGateway {
    pub fn new(client: Arc<dyn ChatClient>, max_concurrent: usize) -> Self {
        Self {
            client,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: ChatOptions,
    ) -> Result<ChatReply, LlmError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| LlmError::Transport("LLM semaphore closed".into()))?;
        self.client.chat(model, messages, options).await
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

// ──────────────────────────────────────────────
// MockChatClient (testing)
// ──────────────────────────────────────────────

/// Mock chat client returning queued responses in order.
///
/// Records received prompts and tracks the maximum number of concurrent
/// in-flight calls so semaphore bounds can be asserted.
pub struct MockChatClient {
    responses: std::sync::Mutex<std::collections::VecDeque<Result<String, LlmError>>>,
    fallback: String,
    calls: std::sync::Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay_ms: u64,
}

impl MockChatClient {
    /// Client that always answers with `response`.
    pub fn new(response: &str) -> Self {
        Self {
            responses: std::sync::Mutex::new(std::collections::VecDeque::new()),
            fallback: response.to_string(),
            calls: std::sync::Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            delay_ms: 0,
        }
    }

    /// Client that answers with the queued responses in order, then the last.
    pub fn with_responses(responses: Vec<Result<String, LlmError>>) -> Self {
        let fallback = responses
            .iter()
            .rev()
            .find_map(|r| r.as_ref().ok().cloned())
            .unwrap_or_default();
        Self {
            responses: std::sync::Mutex::new(responses.into_iter().collect()),
            fallback,
            calls: std::sync::Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            delay_ms: 0,
        }
    }

    /// Add an artificial per-call delay so concurrency bounds are observable.
    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Prompts received so far (last message content per call).
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Highest number of simultaneously in-flight calls observed.
    pub fn max_observed_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn chat(
        &self,
        _model: &str,
        messages: &[ChatMessage],
        _options: ChatOptions,
    ) -> Result<ChatReply, LlmError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(last) = messages.last() {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(last.content.clone());
            }
        }

        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }

        let next = self.responses.lock().ok().and_then(|mut q| q.pop_front());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match next {
            Some(Ok(content)) => Ok(ChatReply {
                content,
                role: "assistant".into(),
            }),
            Some(Err(e)) => Err(e),
            None => Ok(ChatReply {
                content: self.fallback.clone(),
                role: "assistant".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_returns_fallback_response() {
        let mock = MockChatClient::new(r#"{"ok": true}"#);
        let reply = mock
            .chat("test-model", &[ChatMessage::user("hi")], ChatOptions::default())
            .await
            .unwrap();
        assert_eq!(reply.content, r#"{"ok": true}"#);
        assert_eq!(reply.role, "assistant");
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn mock_drains_queue_in_order() {
        let mock = MockChatClient::with_responses(vec![
            Ok("first".into()),
            Ok("second".into()),
        ]);
        let opts = ChatOptions::default();
        let r1 = mock.chat("m", &[ChatMessage::user("a")], opts).await.unwrap();
        let r2 = mock.chat("m", &[ChatMessage::user("b")], opts).await.unwrap();
        let r3 = mock.chat("m", &[ChatMessage::user("c")], opts).await.unwrap();
        assert_eq!(r1.content, "first");
        assert_eq!(r2.content, "second");
        // Queue exhausted — falls back to the last successful response
        assert_eq!(r3.content, "second");
    }

    #[tokio::test]
    async fn mock_propagates_queued_errors() {
        let mock = MockChatClient::with_responses(vec![
            Err(LlmError::Upstream {
                status: 401,
                message: "invalid_api_key".into(),
            }),
            Ok("recovered".into()),
        ]);
        let opts = ChatOptions::default();
        let err = mock
            .chat("m", &[ChatMessage::user("a")], opts)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Upstream { status: 401, .. }));
        let ok = mock.chat("m", &[ChatMessage::user("b")], opts).await.unwrap();
        assert_eq!(ok.content, "recovered");
    }

    #[tokio::test]
    async fn missing_api_key_is_typed_error() {
        let client = GroqClient::new(None);
        let err = client
            .chat("m", &[ChatMessage::user("hi")], ChatOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey));
    }

    #[tokio::test]
    async fn gateway_bounds_concurrent_calls() {
        let mock = Arc::new(MockChatClient::new("{}").with_delay_ms(30));
        let gateway = Arc::new(LlmGateway::new(mock.clone(), 2));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let gw = gateway.clone();
            handles.push(tokio::spawn(async move {
                gw.chat("m", &[ChatMessage::user("x")], ChatOptions::default())
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert!(
            mock.max_observed_in_flight() <= 2,
            "observed {} concurrent calls with 2 permits",
            mock.max_observed_in_flight()
        );
        assert_eq!(mock.call_count(), 8);
        assert_eq!(gateway.available_permits(), 2);
    }

    #[test]
    fn upstream_error_maps_auth_failures() {
        assert_eq!(
            map_upstream_error("HTTP 401: invalid_api_key"),
            "AI service error, check API key"
        );
        assert_eq!(
            map_upstream_error("Authentication failed for request"),
            "AI service error, check API key"
        );
        assert_eq!(map_upstream_error("connection reset"), "connection reset");
    }

    #[test]
    fn json_mode_serializes_response_format() {
        let request = WireRequest {
            model: "m",
            messages: &[ChatMessage::user("hi")],
            temperature: 0.1,
            max_tokens: 1024,
            response_format: Some(WireResponseFormat {
                kind: "json_object",
            }),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""response_format":{"type":"json_object"}"#));
    }

    #[test]
    fn plain_mode_omits_response_format() {
        let request = WireRequest {
            model: "m",
            messages: &[ChatMessage::user("hi")],
            temperature: 0.1,
            max_tokens: 1024,
            response_format: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("response_format"));
    }
}
