//! Completion service abstraction and its OpenAI-compatible implementation.
//!
//! Provides the `CompletionService` trait so the naming pipeline can ask a
//! language model for help without knowing which provider answers. Every
//! call carries its own hard timeout and a bounded number of retries.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Delay before the first retry; doubled on each further attempt.
const BASE_BACKOFF_MS: u64 = 500;

/// Longest delay between two attempts.
const MAX_BACKOFF_MS: u64 = 30_000;

/// Errors from completion service calls.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompletionError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Completion service not available")]
    Unavailable,

    #[error("Missing API key")]
    MissingApiKey,
}

impl CompletionError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::ParseError(_) | Self::Unavailable | Self::MissingApiKey => false,
        }
    }
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// Messages sent in one completion call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
}

impl CompletionRequest {
    /// A system message followed by a user message.
    pub fn chat(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system.into(),
                },
                Message {
                    role: "user".to_string(),
                    content: user.into(),
                },
            ],
        }
    }
}

/// Per-call model settings.
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Extra attempts after the first failure
    pub retries: u32,
    /// Hard ceiling for a single attempt
    pub timeout_ms: u64,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 300,
            temperature: 0.2,
            retries: 2,
            timeout_ms: 15_000,
        }
    }
}

/// A successful completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub output: String,
    pub tokens_used: Option<u32>,
}

/// Trait for completion providers (OpenAI-compatible HTTP, test fakes, ...)
pub trait CompletionService {
    /// Run one completion, including retries and timeouts.
    fn complete(
        &self,
        request: &CompletionRequest,
        options: &CompletionOptions,
    ) -> impl Future<Output = Result<Completion, CompletionError>> + Send;

    /// Check if the service is reachable.
    fn health_check(&self) -> impl Future<Output = Result<(), CompletionError>> + Send;

    /// Get the service name for logging.
    fn name(&self) -> &'static str;
}

/// Run `attempt` up to `1 + retries` times, each under the per-call timeout,
/// with exponential backoff between retryable failures.
pub async fn with_retries<F, Fut>(options: &CompletionOptions, attempt: F) -> Result<Completion, CompletionError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Completion, CompletionError>>,
{
    with_paced_retries(options, || std::future::ready(()), attempt).await
}

/// Like `with_retries`, but awaits `pace` before every attempt (including
/// retries). The wait is not counted against the attempt's timeout.
pub async fn with_paced_retries<P, PFut, F, Fut>(
    options: &CompletionOptions,
    mut pace: P,
    mut attempt: F,
) -> Result<Completion, CompletionError>
where
    P: FnMut() -> PFut,
    PFut: Future<Output = ()>,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Completion, CompletionError>>,
{
    let limit = Duration::from_millis(options.timeout_ms);
    let mut tries = 0;

    loop {
        pace().await;
        let result = match tokio::time::timeout(limit, attempt(tries)).await {
            Ok(result) => result,
            Err(_) => Err(CompletionError::Timeout(options.timeout_ms)),
        };

        match result {
            Ok(completion) => return Ok(completion),
            Err(e) if e.is_retryable() && tries < options.retries => {
                let backoff = backoff(tries);
                tracing::warn!(attempt = tries + 1, error = %e, ?backoff, "Completion attempt failed, retrying");
                tokio::time::sleep(backoff).await;
                tries += 1;
            }
            Err(e) => {
                tracing::warn!(attempt = tries + 1, error = %e, "Completion failed");
                return Err(e);
            }
        }
    }
}

/// Delay after the `tries`-th failed attempt, capped at `MAX_BACKOFF_MS`.
pub fn backoff(tries: u32) -> Duration {
    let factor = 1u64.checked_shl(tries).unwrap_or(u64::MAX);
    Duration::from_millis(BASE_BACKOFF_MS.saturating_mul(factor).min(MAX_BACKOFF_MS))
}

/// OpenAI-compatible endpoint configuration.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Base URL up to and including the API version (`.../v1`)
    pub base_url: String,
    pub api_key: Option<String>,
    /// Connection establishment timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            connect_timeout_secs: 5,
        }
    }
}

/// Chat completions over HTTP.
pub struct OpenAiBackend {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiBackend {
    /// Create a new backend.
    pub fn new(config: OpenAiConfig) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| CompletionError::Connection(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn api_key(&self) -> Result<&str, CompletionError> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(CompletionError::MissingApiKey)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn send_once(
        &self,
        body: &serde_json::Value,
        api_key: &str,
    ) -> Result<Completion, CompletionError> {
        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| CompletionError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status { status, body });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CompletionError::ParseError(e.to_string()))?;

        parse_chat_response(&json)
    }
}

impl CompletionService for OpenAiBackend {
    async fn complete(
        &self,
        request: &CompletionRequest,
        options: &CompletionOptions,
    ) -> Result<Completion, CompletionError> {
        let api_key = self.api_key()?;
        let body = build_chat_body(request, options);

        tracing::debug!(model = %options.model, "Sending chat completion");

        with_retries(options, |_| self.send_once(&body, api_key)).await
    }

    async fn health_check(&self) -> Result<(), CompletionError> {
        let api_key = self.api_key()?;
        let response = self
            .client
            .get(self.endpoint("models"))
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|e| CompletionError::Connection(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CompletionError::Unavailable)
        }
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Placeholder service for runs without a model; always unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompletion;

impl CompletionService for NoCompletion {
    async fn complete(
        &self,
        _request: &CompletionRequest,
        _options: &CompletionOptions,
    ) -> Result<Completion, CompletionError> {
        Err(CompletionError::Unavailable)
    }

    async fn health_check(&self) -> Result<(), CompletionError> {
        Err(CompletionError::Unavailable)
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// JSON body for `POST /chat/completions`.
pub fn build_chat_body(request: &CompletionRequest, options: &CompletionOptions) -> serde_json::Value {
    serde_json::json!({
        "model": options.model,
        "messages": request.messages,
        "max_tokens": options.max_tokens,
        "temperature": options.temperature,
    })
}

/// Extract the first choice's message content and token usage.
pub fn parse_chat_response(response: &serde_json::Value) -> Result<Completion, CompletionError> {
    let output = response
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| CompletionError::ParseError("Missing choices[0].message.content".to_string()))?;

    let tokens_used = response
        .get("usage")
        .and_then(|u| u.get("total_tokens"))
        .and_then(|t| t.as_u64())
        .and_then(|t| u32::try_from(t).ok());

    Ok(Completion {
        output: output.to_string(),
        tokens_used,
    })
}
