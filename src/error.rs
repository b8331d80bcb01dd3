//! Error types for crax.

/// Top-level error type for the voice command classifier.
#[derive(Debug, thiserror::Error)]
pub enum CraxError {
    /// Audio device or stream error.
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text transcription error.
    #[error("STT error: {0}")]
    Stt(String),

    /// Completion service error (transport, HTTP status, malformed reply).
    #[error("LLM error: {0}")]
    Llm(String),

    /// Text-to-speech synthesis error.
    #[error("TTS error: {0}")]
    Tts(String),

    /// Durable keyword log error.
    #[error("keyword store error: {0}")]
    Keywords(String),

    /// Action handler failure.
    #[error("action error: {0}")]
    Action(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, CraxError>;
