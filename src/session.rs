//! The voice command loop.
//!
//! One [`SessionLoop`] owns every collaborator for the lifetime of a
//! session and drives utterances through
//! `Listening → Classifying → (Persisting) → Dispatching → Responding`,
//! one at a time. Cancellation is honored at every await point.

use crate::actions::{ActionRegistry, DispatchReport};
use crate::classifier::{ClassificationResult, IntentClassifier};
use crate::config::SessionConfig;
use crate::error::Result;
use crate::keywords::{Keyword, KeywordSet, KeywordStore, PersistOutcome};
use crate::responder::ResponseGenerator;
use crate::stt::{Capture, SpeechRecognizer};
use crate::tts::Speaker;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the next utterance.
    Listening,
    Classifying,
    /// Recording a newly learned keyword.
    Persisting,
    Dispatching,
    /// Generating and speaking the confirmation.
    Responding,
    /// Terminal.
    Exiting,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The user said an exit phrase.
    ExitPhrase,
    /// The cancellation token fired.
    Interrupted,
    /// The recognizer has no more input.
    InputClosed,
}

/// Result of processing one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// An exit phrase was heard and the farewell spoken.
    Exit,
    /// Classification failed; the apology was spoken.
    NotUnderstood,
    /// The utterance was classified, dispatched and confirmed.
    Handled {
        keyword: Keyword,
        /// Whether the keyword was learned on this turn.
        learned: bool,
        report: DispatchReport,
        response: String,
    },
}

/// Counters for a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Utterances recognized.
    pub utterances: usize,
    /// Utterances that reached an action handler.
    pub dispatched: usize,
    /// Keywords learned this session, in order.
    pub learned: Vec<Keyword>,
    /// Classification, persistence and action failures.
    pub errors: usize,
    pub exit: ExitReason,
}

/// Tunables and phrases for a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// How long to wait for speech to start. `None` waits forever.
    pub listen_timeout: Option<Duration>,
    /// Maximum phrase length. `None` is unbounded.
    pub phrase_time_limit: Option<Duration>,
    /// Pause after each handled utterance.
    pub cooldown: Duration,
    /// Substrings that end the session, lower-case.
    pub exit_phrases: Vec<String>,
    pub greeting: String,
    pub farewell: String,
    pub interrupt_farewell: String,
    pub apology: String,
}

impl SessionOptions {
    /// Options from the `[session]` config section.
    #[must_use]
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            listen_timeout: config.listen_timeout(),
            phrase_time_limit: config.phrase_time_limit(),
            cooldown: config.cooldown(),
            exit_phrases: config
                .exit_phrases
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            greeting: config.greeting.clone(),
            farewell: config.farewell.clone(),
            interrupt_farewell: config.interrupt_farewell.clone(),
            apology: config.apology.clone(),
        }
    }

    /// Whether `utterance` contains an exit phrase.
    #[must_use]
    pub fn is_exit(&self, utterance: &str) -> bool {
        let normalized = utterance.trim().to_lowercase();
        self.exit_phrases
            .iter()
            .any(|phrase| normalized.contains(phrase.as_str()))
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

/// Owns the collaborators and runs the listen/act/respond loop.
pub struct SessionLoop {
    recognizer: Box<dyn SpeechRecognizer>,
    speaker: Box<dyn Speaker>,
    classifier: IntentClassifier,
    responder: ResponseGenerator,
    registry: ActionRegistry,
    store: KeywordStore,
    options: SessionOptions,
    known: KeywordSet,
    state: SessionState,
    utterances: usize,
    dispatched: usize,
    learned: Vec<Keyword>,
    errors: usize,
}

impl SessionLoop {
    /// Assemble a session. The known keyword set is loaded from `store`.
    pub fn new(
        recognizer: Box<dyn SpeechRecognizer>,
        speaker: Box<dyn Speaker>,
        classifier: IntentClassifier,
        responder: ResponseGenerator,
        registry: ActionRegistry,
        store: KeywordStore,
        options: SessionOptions,
    ) -> Self {
        let known = store.load();
        Self {
            recognizer,
            speaker,
            classifier,
            responder,
            registry,
            store,
            options,
            known,
            state: SessionState::Listening,
            utterances: 0,
            dispatched: 0,
            learned: Vec::new(),
            errors: 0,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Keywords known to this session, built-ins included.
    #[must_use]
    pub fn known(&self) -> &KeywordSet {
        &self.known
    }

    /// Run until an exit phrase, cancellation, or end of input.
    ///
    /// # Errors
    ///
    /// Reserved for startup failures; turn-level failures are logged and
    /// absorbed.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<SessionSummary> {
        info!(
            "session starting with {} known keywords ({} learned)",
            self.known.len(),
            self.store.learned().len()
        );

        let greeting = self.options.greeting.clone();
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(self.interrupted().await),
            () = self.say(&greeting) => {}
        }

        loop {
            self.transition(SessionState::Listening);
            let timeout = self.options.listen_timeout;
            let limit = self.options.phrase_time_limit;

            let capture = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(self.interrupted().await),
                capture = self.recognizer.capture(timeout, limit) => capture,
            };

            let text = match capture {
                Capture::Heard(text) => text,
                Capture::Nothing => continue,
                Capture::Closed => {
                    info!("input closed, ending session");
                    self.transition(SessionState::Exiting);
                    return Ok(self.summary(ExitReason::InputClosed));
                }
            };

            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(self.interrupted().await),
                outcome = self.handle_utterance(&text) => outcome,
            };

            if outcome == TurnOutcome::Exit {
                return Ok(self.summary(ExitReason::ExitPhrase));
            }
        }
    }

    /// Process one recognized utterance end to end, cooldown included.
    pub async fn handle_utterance(&mut self, text: &str) -> TurnOutcome {
        self.utterances += 1;

        if self.options.is_exit(text) {
            info!("exit phrase heard: {text}");
            self.transition(SessionState::Exiting);
            let farewell = self.options.farewell.clone();
            self.say(&farewell).await;
            return TurnOutcome::Exit;
        }

        self.transition(SessionState::Classifying);
        let (keyword, learned) = match self.classifier.classify(text, &self.known).await {
            ClassificationResult::Known(keyword) => (keyword, false),
            ClassificationResult::New(keyword) => {
                self.transition(SessionState::Persisting);
                self.learn(&keyword);
                (keyword, true)
            }
            ClassificationResult::Error => {
                self.errors += 1;
                let apology = self.options.apology.clone();
                self.say(&apology).await;
                self.transition(SessionState::Listening);
                return TurnOutcome::NotUnderstood;
            }
        };
        info!("Detected keyword: {keyword}");

        self.transition(SessionState::Dispatching);
        let report = self.registry.dispatch(&keyword, text);
        self.dispatched += 1;
        if report.failure.is_some() {
            self.errors += 1;
        }

        self.transition(SessionState::Responding);
        let response = self.responder.generate(&keyword).await;
        self.say(&response).await;

        if !self.options.cooldown.is_zero() {
            tokio::time::sleep(self.options.cooldown).await;
        }
        self.transition(SessionState::Listening);

        TurnOutcome::Handled {
            keyword,
            learned,
            report,
            response,
        }
    }

    fn learn(&mut self, keyword: &Keyword) {
        self.known.insert(keyword.clone());
        self.learned.push(keyword.clone());
        match self.store.persist(keyword) {
            Ok(PersistOutcome::Added) => info!("learned new keyword: {keyword}"),
            Ok(PersistOutcome::AlreadyPresent) => {
                debug!("keyword {keyword} was already in the log");
            }
            Err(e) => {
                self.errors += 1;
                error!("couldn't save keyword {keyword}: {e}");
            }
        }
    }

    async fn interrupted(&mut self) -> SessionSummary {
        info!("session interrupted");
        self.transition(SessionState::Exiting);
        let farewell = self.options.interrupt_farewell.clone();
        self.say(&farewell).await;
        self.summary(ExitReason::Interrupted)
    }

    async fn say(&mut self, text: &str) {
        if let Err(e) = self.speaker.speak(text, true).await {
            warn!("couldn't speak {text:?}: {e}");
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!("session state {:?} -> {next:?}", self.state);
            self.state = next;
        }
    }

    fn summary(&self, exit: ExitReason) -> SessionSummary {
        SessionSummary {
            utterances: self.utterances,
            dispatched: self.dispatched,
            learned: self.learned.clone(),
            errors: self.errors,
            exit,
        }
    }
}
