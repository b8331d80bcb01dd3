//! Utterance → keyword classification.
//!
//! The completion service is asked to answer with exactly one token: a known
//! keyword verbatim, or `NEW:<keyword>` when nothing known fits. Replies are
//! parsed strictly. A reply that is neither a member of the known set nor a
//! well-formed proposal is an [`ClassificationResult::Error`], so the loop
//! never dispatches on a keyword it has not actually learned.

use crate::keywords::{Keyword, KeywordSet};
use crate::llm::{CompletionRequest, CompletionService};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Prefix marking a new-keyword proposal, compared after lower-casing.
pub const NEW_KEYWORD_PREFIX: &str = "new:";

/// Outcome of classifying one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationResult {
    /// The utterance maps to a keyword already in the known set.
    Known(Keyword),
    /// The service proposed a keyword that is not yet known.
    New(Keyword),
    /// The service failed or answered outside the protocol.
    Error,
}

/// Tunables for [`IntentClassifier`].
#[derive(Debug, Clone)]
pub struct ClassifierOptions {
    /// Output token budget for the classification reply.
    pub max_output_tokens: u32,
}

impl Default for ClassifierOptions {
    fn default() -> Self {
        Self {
            max_output_tokens: 10,
        }
    }
}

/// Maps utterances to keywords via a completion service.
#[derive(Clone)]
pub struct IntentClassifier {
    service: Arc<dyn CompletionService>,
    options: ClassifierOptions,
}

impl IntentClassifier {
    /// Create a classifier backed by `service`.
    pub fn new(service: Arc<dyn CompletionService>, options: ClassifierOptions) -> Self {
        Self { service, options }
    }

    /// Classify `utterance` against the `known` vocabulary.
    ///
    /// Sends one deterministic (temperature 0) request. Service failures
    /// are logged and reported as [`ClassificationResult::Error`].
    pub async fn classify(&self, utterance: &str, known: &KeywordSet) -> ClassificationResult {
        let prompt = build_prompt(utterance, known);
        let request = CompletionRequest::new(prompt, self.options.max_output_tokens, 0.0);

        match self.service.complete(&request).await {
            Ok(completion) => {
                info!("classifier returned: '{}'", completion.text.trim());
                parse_response(&completion.text, known)
            }
            Err(e) => {
                warn!("keyword classification failed: {e}");
                ClassificationResult::Error
            }
        }
    }
}

/// Build the classification prompt.
///
/// Known keywords are listed in sorted order so identical vocabularies
/// always produce identical prompts.
#[must_use]
pub fn build_prompt(utterance: &str, known: &KeywordSet) -> String {
    let mut prompt = String::new();
    prompt.push_str("You are an intent extraction assistant.\n");
    prompt.push_str("Below is a list of known command keywords:\n");
    prompt.push_str(&known.joined(", "));
    prompt.push_str("\n\n");
    prompt.push_str("Given the user's command, return exactly one token: ");
    prompt.push_str("either one of the known keywords (exactly) if the user's intent matches it,\n");
    prompt.push_str(
        "or if no known keyword applies, suggest a concise new keyword using the exact format: \
         NEW:<single_word_keyword>.\n",
    );
    prompt.push_str(
        "Do not include any extra words, explanation, or punctuation. Always respond in lowercase.\n\n",
    );
    prompt.push_str(&format!("User command: {utterance}\n"));
    prompt.push_str("Return:");
    prompt
}

/// Parse a raw classification reply.
///
/// - `new:<word> ...` → the first token after the prefix becomes a
///   proposal; anything after it is discarded. A proposal that is already
///   known is reported as [`ClassificationResult::Known`].
/// - anything else must normalize to a member of `known`.
#[must_use]
pub fn parse_response(raw: &str, known: &KeywordSet) -> ClassificationResult {
    let normalized = raw.trim().to_lowercase();

    if let Some(rest) = normalized.strip_prefix(NEW_KEYWORD_PREFIX) {
        let Some(first) = rest.split_whitespace().next() else {
            debug!("empty new-keyword proposal");
            return ClassificationResult::Error;
        };
        return match Keyword::new(first) {
            Ok(k) if known.contains(&k) => ClassificationResult::Known(k),
            Ok(k) => ClassificationResult::New(k),
            Err(e) => {
                debug!("invalid new-keyword proposal {first:?}: {e}");
                ClassificationResult::Error
            }
        };
    }

    match Keyword::new(&normalized) {
        Ok(k) if known.contains(&k) => ClassificationResult::Known(k),
        Ok(k) => {
            warn!("classifier answered unknown keyword '{k}' without the {NEW_KEYWORD_PREFIX} marker");
            ClassificationResult::Error
        }
        Err(e) => {
            debug!("unusable classifier reply {normalized:?}: {e}");
            ClassificationResult::Error
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::test_utils::ScriptedCompletions;

    fn kw(s: &str) -> Keyword {
        Keyword::new(s).unwrap()
    }

    fn known() -> KeywordSet {
        KeywordSet::builtin()
    }

    #[test]
    fn prompt_lists_keywords_sorted() {
        let set: KeywordSet = ["video", "music", "alarm"].iter().map(|k| kw(k)).collect();
        let prompt = build_prompt("play a song", &set);
        assert!(prompt.contains("alarm, music, video"));
        assert!(prompt.contains("User command: play a song"));
        assert!(prompt.contains("NEW:<single_word_keyword>"));
        assert!(prompt.contains("lowercase"));
        assert!(prompt.ends_with("Return:"));
    }

    #[test]
    fn prompt_is_deterministic() {
        let a = build_prompt("x", &known());
        let b = build_prompt("x", &known());
        assert_eq!(a, b);
    }

    #[test]
    fn parse_known_keyword() {
        assert_eq!(
            parse_response("music", &known()),
            ClassificationResult::Known(kw("music"))
        );
        assert_eq!(
            parse_response("  Music.\n", &known()),
            ClassificationResult::Known(kw("music"))
        );
    }

    #[test]
    fn parse_new_keyword_takes_first_token() {
        assert_eq!(
            parse_response("new:lamp", &known()),
            ClassificationResult::New(kw("lamp"))
        );
        assert_eq!(
            parse_response("NEW: Lamp please", &known()),
            ClassificationResult::New(kw("lamp"))
        );
    }

    #[test]
    fn parse_new_keyword_truncates_noise() {
        let set: KeywordSet = ["music"].iter().map(|k| kw(k)).collect();
        assert_eq!(
            parse_response("new:reminder please", &set),
            ClassificationResult::New(kw("reminder"))
        );
    }

    #[test]
    fn parse_new_proposal_of_known_keyword_is_known() {
        assert_eq!(
            parse_response("new:music", &known()),
            ClassificationResult::Known(kw("music"))
        );
    }

    #[test]
    fn parse_empty_proposal_is_error() {
        assert_eq!(parse_response("new:", &known()), ClassificationResult::Error);
        assert_eq!(parse_response("new:   ", &known()), ClassificationResult::Error);
    }

    #[test]
    fn parse_unknown_echo_is_error() {
        assert_eq!(parse_response("musics", &known()), ClassificationResult::Error);
        assert_eq!(
            parse_response("i think music", &known()),
            ClassificationResult::Error
        );
        assert_eq!(parse_response("", &known()), ClassificationResult::Error);
    }

    #[tokio::test]
    async fn classify_sends_deterministic_request() {
        let service = Arc::new(ScriptedCompletions::new(["music"]));
        let classifier = IntentClassifier::new(service.clone(), ClassifierOptions::default());

        let result = classifier.classify("play some music", &known()).await;
        assert_eq!(result, ClassificationResult::Known(kw("music")));

        let requests = service.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].temperature, 0.0);
        assert_eq!(requests[0].max_output_tokens, 10);
        assert_eq!(requests[0].completions, 1);
        assert!(requests[0].prompt.contains("play some music"));
    }

    #[tokio::test]
    async fn classify_service_failure_is_error() {
        let service = Arc::new(ScriptedCompletions::failing());
        let classifier = IntentClassifier::new(service, ClassifierOptions::default());
        assert_eq!(
            classifier.classify("anything", &known()).await,
            ClassificationResult::Error
        );
    }
}
