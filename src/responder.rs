//! Short spoken confirmations after an action runs.

use crate::keywords::Keyword;
use crate::llm::{CompletionRequest, CompletionService};
use std::sync::Arc;
use tracing::warn;

/// Spoken when the completion service cannot produce a confirmation.
pub const FALLBACK_RESPONSE: &str = "Done.";

/// Tunables for [`ResponseGenerator`].
#[derive(Debug, Clone)]
pub struct ResponderOptions {
    /// Output token budget.
    pub max_output_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
}

impl Default for ResponderOptions {
    fn default() -> Self {
        Self {
            max_output_tokens: 20,
            temperature: 0.7,
        }
    }
}

/// Asks the completion service for a one-line confirmation.
#[derive(Clone)]
pub struct ResponseGenerator {
    service: Arc<dyn CompletionService>,
    options: ResponderOptions,
}

impl ResponseGenerator {
    /// Create a generator backed by `service`.
    pub fn new(service: Arc<dyn CompletionService>, options: ResponderOptions) -> Self {
        Self { service, options }
    }

    /// A friendly line confirming the action for `keyword`.
    ///
    /// Never fails: any service error or empty reply yields
    /// [`FALLBACK_RESPONSE`].
    pub async fn generate(&self, keyword: &Keyword) -> String {
        let request = CompletionRequest::new(
            confirmation_prompt(keyword),
            self.options.max_output_tokens,
            self.options.temperature,
        );

        match self.service.complete(&request).await {
            Ok(completion) => {
                let line = clean_line(&completion.text);
                if line.is_empty() {
                    FALLBACK_RESPONSE.to_owned()
                } else {
                    line
                }
            }
            Err(e) => {
                warn!("error getting dynamic response: {e}");
                FALLBACK_RESPONSE.to_owned()
            }
        }
    }
}

/// Prompt asking for a confirmation line.
#[must_use]
pub fn confirmation_prompt(keyword: &Keyword) -> String {
    format!(
        "Say a short friendly line when the assistant performs '{keyword}'. Keep it under 12 words."
    )
}

/// Trim whitespace and one layer of wrapping quotes.
fn clean_line(raw: &str) -> String {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    unquoted.trim().to_owned()
}
