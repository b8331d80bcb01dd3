//! CRA-X: a voice command classifier that learns new keywords.
//!
//! Each spoken utterance is mapped to a single keyword by a completion
//! service, dispatched to an action handler, and confirmed aloud:
//! Microphone → VAD → STT → classifier → action → responder → TTS
//!
//! # Architecture
//!
//! - **Audio capture**: Records one phrase at a time via `cpal`
//! - **VAD**: Energy-based phrase detection with ambient calibration
//! - **STT**: Transcribes phrases over an OpenAI-compatible API
//! - **Classifier**: Asks the completion service for a known or `NEW:` keyword
//! - **Keywords**: Learned vocabulary persisted to a JSON log
//! - **Actions**: Keyword → handler table with a fallback
//! - **TTS**: Speaks confirmations through the platform synthesizer

pub mod actions;
pub mod audio;
pub mod classifier;
pub mod config;
pub mod crax_dirs;
pub mod error;
pub mod keywords;
pub mod llm;
pub mod responder;
pub mod session;
pub mod stt;
pub mod tts;
pub mod vad;

#[cfg(test)]
pub(crate) mod test_utils;

pub use actions::{ActionHandler, ActionRegistry, DispatchReport};
pub use classifier::{ClassificationResult, IntentClassifier};
pub use config::CraxConfig;
pub use error::{CraxError, Result};
pub use keywords::{Keyword, KeywordSet, KeywordStore};
pub use responder::ResponseGenerator;
pub use session::{ExitReason, SessionLoop, SessionOptions, SessionSummary, TurnOutcome};
