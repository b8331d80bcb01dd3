//! Completion service used for keyword classification and confirmations.
//!
//! [`OpenAiCompletionClient`] talks to any server implementing the OpenAI
//! chat completions API (OpenAI, Ollama, vLLM, llama.cpp server, ...).
//! Requests are single-shot: no streaming and no retries.

use crate::config::LlmConfig;
use crate::error::{CraxError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// One completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Prompt text sent as a single user message.
    pub prompt: String,
    /// Output token budget.
    pub max_output_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
    /// Number of completions requested. Always 1.
    pub completions: u32,
}

impl CompletionRequest {
    /// A single-completion request.
    pub fn new(prompt: impl Into<String>, max_output_tokens: u32, temperature: f64) -> Self {
        Self {
            prompt: prompt.into(),
            max_output_tokens,
            temperature,
            completions: 1,
        }
    }
}

/// The text of the first completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Raw completion text.
    pub text: String,
}

/// An external text completion service.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Request a single completion.
    ///
    /// # Errors
    ///
    /// Returns [`CraxError::Llm`] on transport failure, a non-success
    /// status, or a malformed response.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;
}

/// Connection settings for [`OpenAiCompletionClient`].
#[derive(Debug, Clone)]
pub struct OpenAiClientConfig {
    /// Base URL (`https://api.openai.com`, optionally ending in `/v1`).
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Bearer token. Empty sends no `Authorization` header.
    pub api_key: String,
    /// Optional request timeout.
    pub timeout: Option<Duration>,
}

impl OpenAiClientConfig {
    /// Create a config with the given base URL and model.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: String::new(),
            timeout: None,
        }
    }

    /// Set the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Set a request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build from the `[llm]` config section.
    ///
    /// # Errors
    ///
    /// Returns [`CraxError::Config`] if no API key can be resolved.
    pub fn from_llm_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            CraxError::Config(format!(
                "no API key: set llm.api_key or the {} environment variable",
                config.api_key_env
            ))
        })?;
        let mut out = Self::new(&config.api_url, &config.model).with_api_key(api_key);
        out.timeout = config.request_timeout();
        Ok(out)
    }
}

/// Completion client for OpenAI-compatible chat completion endpoints.
pub struct OpenAiCompletionClient {
    config: OpenAiClientConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiCompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompletionClient")
            .field("model", &self.config.model)
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

impl OpenAiCompletionClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: OpenAiClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| CraxError::Llm(format!("failed to build HTTP client: {e}")))?;
        info!(
            "completion service configured: {} model={}",
            config.base_url, config.model
        );
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let base = base.strip_suffix("/v1").unwrap_or(base);
        format!("{base}/v1/chat/completions")
    }

    fn map_http_error(status: reqwest::StatusCode, body: &str) -> CraxError {
        let message = extract_error_message(body);
        match status.as_u16() {
            401 => CraxError::Llm(format!("authentication failed: {message}")),
            429 => CraxError::Llm(format!("rate limited: {message}")),
            code => CraxError::Llm(format!("HTTP {code}: {message}")),
        }
    }
}

/// Build the JSON request body for the chat completions API.
#[must_use]
pub fn build_completions_body(model: &str, request: &CompletionRequest) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "messages": [{"role": "user", "content": request.prompt}],
        "max_tokens": request.max_output_tokens,
        "temperature": request.temperature,
        "n": request.completions,
        "stream": false,
    })
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Extract an error message from an OpenAI error response body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl CompletionService for OpenAiCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let body = build_completions_body(&self.config.model, request);

        let mut http = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json");
        if !self.config.api_key.is_empty() {
            http = http.header("Authorization", format!("Bearer {}", self.config.api_key));
        }

        let response = http
            .json(&body)
            .send()
            .await
            .map_err(|e| CraxError::Llm(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Self::map_http_error(status, &body_text));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| CraxError::Llm(format!("malformed response: {e}")))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or_else(|| CraxError::Llm("response has no completion text".to_owned()))?;

        debug!("completion returned {} chars", text.len());
        Ok(Completion { text })
    }
}
