//! Transcription over an OpenAI-compatible `/v1/audio/transcriptions` endpoint.

use crate::config::{LlmConfig, SttConfig};
use crate::error::{CraxError, Result};
use serde::Deserialize;
use std::io::Cursor;
use tracing::info;

/// HTTP client for a Whisper-style transcription API.
pub struct TranscriptionClient {
    base_url: String,
    model: String,
    language: Option<String>,
    api_key: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for TranscriptionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptionClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

impl TranscriptionClient {
    /// Create a client for `base_url` using `model`.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            language: None,
            api_key: String::new(),
            client: reqwest::Client::new(),
        }
    }

    /// Set the bearer token.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Set a language hint.
    #[must_use]
    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    /// Build from the `[stt]` section, borrowing URL and key from `[llm]`.
    #[must_use]
    pub fn from_config(stt: &SttConfig, llm: &LlmConfig) -> Self {
        let base_url = stt.api_url.clone().unwrap_or_else(|| llm.api_url.clone());
        info!("STT configured: {base_url} model={}", stt.model);
        Self::new(base_url, &stt.model)
            .with_api_key(llm.resolve_api_key().unwrap_or_default())
            .with_language(stt.language.clone())
    }

    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let base = base.strip_suffix("/v1").unwrap_or(base);
        format!("{base}/v1/audio/transcriptions")
    }

    /// Transcribe mono samples.
    ///
    /// # Errors
    ///
    /// Returns [`CraxError::Stt`] on encoding, transport, or HTTP failure.
    pub async fn transcribe(&self, samples: &[f32], sample_rate: u32) -> Result<String> {
        let wav = encode_wav(samples, sample_rate)?;

        let file = reqwest::multipart::Part::bytes(wav)
            .file_name("speech.wav")
            .mime_str("audio/wav")
            .map_err(|e| CraxError::Stt(format!("invalid mime type: {e}")))?;
        let mut form = reqwest::multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", "json")
            .part("file", file);
        if let Some(ref lang) = self.language {
            form = form.text("language", lang.clone());
        }

        let mut request = self.client.post(self.endpoint()).multipart(form);
        if !self.api_key.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| CraxError::Stt(format!("transcription request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CraxError::Stt(format!(
                "transcription HTTP {}: {body}",
                status.as_u16()
            )));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| CraxError::Stt(format!("malformed transcription response: {e}")))?;
        Ok(parsed.text.trim().to_owned())
    }
}

/// Encode mono f32 samples as a 16-bit PCM WAV file in memory.
///
/// # Errors
///
/// Returns [`CraxError::Stt`] if encoding fails.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| CraxError::Stt(format!("failed to create wav writer: {e}")))?;
        for &s in samples {
            let clamped = s.clamp(-1.0, 1.0);
            let v = (clamped * i16::MAX as f32).round() as i16;
            writer
                .write_sample(v)
                .map_err(|e| CraxError::Stt(format!("failed to write wav sample: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| CraxError::Stt(format!("failed to finalize wav: {e}")))?;
    }
    Ok(cursor.into_inner())
}
