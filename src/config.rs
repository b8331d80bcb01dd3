//! Configuration types for the voice command loop.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration, loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CraxConfig {
    /// Session loop timing and spoken phrases.
    pub session: SessionConfig,
    /// Completion service settings.
    pub llm: LlmConfig,
    /// Speech-to-text settings.
    pub stt: SttConfig,
    /// Microphone settings.
    pub audio: AudioConfig,
    /// Voice activity detection settings.
    pub vad: VadConfig,
    /// Text-to-speech settings.
    pub tts: TtsConfig,
    /// Learned keyword log settings.
    pub keywords: KeywordsConfig,
}

/// Session loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds to wait for a phrase to start. `0` waits forever.
    pub listen_timeout_secs: f32,
    /// Maximum phrase length in seconds. `0` means unbounded.
    pub phrase_time_limit_secs: f32,
    /// Pause after each spoken confirmation before listening again.
    ///
    /// Keeps the microphone from picking up the tail of our own speech.
    pub cooldown_ms: u64,
    /// Any of these, found anywhere in an utterance, ends the session.
    pub exit_phrases: Vec<String>,
    /// Spoken once the keyword set is loaded.
    pub greeting: String,
    /// Spoken when an exit phrase is heard.
    pub farewell: String,
    /// Spoken when the process is interrupted (Ctrl+C).
    pub interrupt_farewell: String,
    /// Spoken when classification fails.
    pub apology: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            listen_timeout_secs: 0.0,
            phrase_time_limit_secs: 8.0,
            cooldown_ms: 500,
            exit_phrases: ["stop listening", "stop", "exit", "quit"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            greeting: "CRA-X ready. Say a command or say 'stop listening' to quit.".to_owned(),
            farewell: "Goodbye!".to_owned(),
            interrupt_farewell: "Shutting down. Goodbye.".to_owned(),
            apology: "I had trouble understanding. Try again.".to_owned(),
        }
    }
}

impl SessionConfig {
    /// Listen timeout, `None` when unbounded.
    #[must_use]
    pub fn listen_timeout(&self) -> Option<Duration> {
        secs_to_duration(self.listen_timeout_secs)
    }

    /// Phrase time limit, `None` when unbounded.
    #[must_use]
    pub fn phrase_time_limit(&self) -> Option<Duration> {
        secs_to_duration(self.phrase_time_limit_secs)
    }

    /// Inter-iteration cooldown.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

fn secs_to_duration(secs: f32) -> Option<Duration> {
    if secs > 0.0 {
        Duration::try_from_secs_f32(secs).ok()
    } else {
        None
    }
}

/// Completion service configuration (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the API (`/v1` suffix optional).
    pub api_url: String,
    /// Model identifier.
    pub model: String,
    /// API key. Leave empty to read it from `api_key_env`.
    pub api_key: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Request timeout in seconds. `0` leaves the transport default in place.
    pub request_timeout_secs: u64,
    /// Output token budget for keyword classification.
    pub classify_max_tokens: u32,
    /// Output token budget for the spoken confirmation.
    pub response_max_tokens: u32,
    /// Sampling temperature for the spoken confirmation.
    pub response_temperature: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com".to_owned(),
            model: "gpt-4".to_owned(),
            api_key: String::new(),
            api_key_env: "OPENAI_API_KEY".to_owned(),
            request_timeout_secs: 0,
            classify_max_tokens: 10,
            response_max_tokens: 20,
            response_temperature: 0.7,
        }
    }
}

impl LlmConfig {
    /// Resolve the API key: the literal `api_key` first, then `api_key_env`.
    #[must_use]
    pub fn resolve_api_key(&self) -> Option<String> {
        if !self.api_key.trim().is_empty() {
            return Some(self.api_key.trim().to_owned());
        }
        if self.api_key_env.is_empty() {
            return None;
        }
        std::env::var(&self.api_key_env)
            .ok()
            .map(|k| k.trim().to_owned())
            .filter(|k| !k.is_empty())
    }

    /// Request timeout, `None` when left to the transport.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

/// Speech-to-text configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Transcription API base URL. `None` reuses `llm.api_url`.
    pub api_url: Option<String>,
    /// Transcription model identifier.
    pub model: String,
    /// Optional ISO-639-1 language hint.
    pub language: Option<String>,
    /// Ambient noise calibration window before each capture, in ms.
    pub calibration_ms: u32,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            model: "whisper-1".to_owned(),
            language: Some("en".to_owned()),
            calibration_ms: 800,
        }
    }
}

/// Microphone configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate handed to the transcriber, in Hz.
    pub input_sample_rate: u32,
    /// Input device name (None = system default).
    pub input_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_sample_rate: 16_000,
            input_device: None,
        }
    }
}

/// Voice activity detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    /// Minimum RMS energy treated as speech.
    ///
    /// The effective threshold is raised above the calibrated noise floor
    /// by `noise_multiplier`.
    pub threshold: f32,
    /// Multiplier applied to the calibrated ambient RMS.
    pub noise_multiplier: f32,
    /// Trailing silence that ends a phrase, in ms.
    pub min_silence_duration_ms: u32,
    /// Phrases shorter than this are discarded, in ms.
    pub min_speech_duration_ms: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            threshold: 0.01,
            noise_multiplier: 1.5,
            min_silence_duration_ms: 800,
            min_speech_duration_ms: 250,
        }
    }
}

/// Which speech synthesis backend to use.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsBackend {
    /// System synthesizer when one is installed, console otherwise.
    #[default]
    Auto,
    /// System synthesizer program (`say`, `espeak-ng`, `espeak`).
    Command,
    /// Print replies to stdout.
    Console,
}

/// Text-to-speech configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Backend selection.
    pub backend: TtsBackend,
    /// Explicit synthesizer program. `None` searches `PATH`.
    pub program: Option<String>,
    /// Voice name passed to the synthesizer.
    pub voice: Option<String>,
    /// Speaking rate in words per minute.
    pub rate: Option<u32>,
}

/// Learned keyword log configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordsConfig {
    /// Log location. `None` uses `crax_dirs::keywords_file()`.
    pub path: Option<PathBuf>,
}

impl KeywordsConfig {
    /// Store for the configured log, or the default location.
    #[must_use]
    pub fn store(&self) -> crate::keywords::KeywordStore {
        match self.path {
            Some(ref path) => crate::keywords::KeywordStore::new(path),
            None => crate::keywords::KeywordStore::at_default_path(),
        }
    }
}

impl CraxConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::CraxError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::CraxError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/crax/config.toml`.
    pub fn default_config_path() -> PathBuf {
        crate::crax_dirs::config_file()
    }

    /// Load from `path` when given, otherwise from the default path if it
    /// exists, otherwise defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load(path: Option<&std::path::Path>) -> crate::error::Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let default_path = Self::default_config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}
