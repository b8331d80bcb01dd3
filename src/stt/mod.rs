//! Speech-to-text collaborators.
//!
//! A [`SpeechRecognizer`] yields one utterance per call. Expected failures
//! (no speech, unintelligible audio, transcription service errors) are
//! reported as [`Capture::Nothing`] and logged, never as errors.

mod microphone;
mod text;
mod transcribe;

pub use microphone::MicrophoneRecognizer;
pub use text::TextRecognizer;
pub use transcribe::{TranscriptionClient, encode_wav};

use async_trait::async_trait;
use std::time::Duration;

/// Result of one capture attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    /// Recognized text.
    Heard(String),
    /// Nothing usable was recognized; try again.
    Nothing,
    /// The input source is exhausted; no further utterances will arrive.
    Closed,
}

/// Source of recognized utterances.
#[async_trait]
pub trait SpeechRecognizer: Send {
    /// Wait for and recognize one utterance.
    ///
    /// `timeout` bounds the wait for speech to start; `phrase_time_limit`
    /// bounds the phrase length. `None` means unbounded.
    async fn capture(
        &mut self,
        timeout: Option<Duration>,
        phrase_time_limit: Option<Duration>,
    ) -> Capture;
}
