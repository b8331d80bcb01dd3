//! Shared test doubles for the session collaborators.

use crate::error::{CraxError, Result};
use crate::llm::{Completion, CompletionRequest, CompletionService};
use crate::stt::{Capture, SpeechRecognizer};
use crate::tts::Speaker;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Completion service that replays canned replies in order.
///
/// Once the script runs out every request fails.
pub struct ScriptedCompletions {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletions {
    /// Service answering with `replies`, one per request.
    pub fn new<'a>(replies: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(str::to_owned).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Service that fails every request.
    pub fn failing() -> Self {
        Self::new([])
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletions {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        let reply = self.replies.lock().expect("replies lock").pop_front();
        reply
            .map(|text| Completion { text })
            .ok_or_else(|| CraxError::Llm("service unavailable".to_owned()))
    }
}

/// Recognizer that replays canned captures, then reports `Closed`.
pub struct ScriptedRecognizer {
    captures: VecDeque<Capture>,
}

impl ScriptedRecognizer {
    /// Recognizer hearing each of `lines` in turn.
    pub fn hearing<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(lines.into_iter().map(|l| Capture::Heard(l.to_owned())))
    }

    /// Recognizer replaying `captures`.
    pub fn new(captures: impl IntoIterator<Item = Capture>) -> Self {
        Self {
            captures: captures.into_iter().collect(),
        }
    }
}

#[async_trait]
impl SpeechRecognizer for ScriptedRecognizer {
    async fn capture(&mut self, _: Option<Duration>, _: Option<Duration>) -> Capture {
        self.captures.pop_front().unwrap_or(Capture::Closed)
    }
}

/// Speaker that records every line it is asked to say.
#[derive(Clone, Default)]
pub struct RecordingSpeaker {
    lines: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl RecordingSpeaker {
    /// Speaker that records lines and succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Speaker that records lines but reports every call as failed.
    pub fn broken() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Lines spoken so far, across all clones.
    pub fn spoken(&self) -> Vec<String> {
        self.lines.lock().expect("lines lock").clone()
    }
}

#[async_trait]
impl Speaker for RecordingSpeaker {
    async fn speak(&mut self, text: &str, _wait: bool) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.lines.lock().expect("lines lock").push(text.to_owned());
        if self.fail {
            return Err(CraxError::Tts("audio device busy".to_owned()));
        }
        Ok(())
    }
}
