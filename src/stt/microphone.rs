//! Microphone-backed recognizer: record a phrase, then transcribe it.

use super::{Capture, SpeechRecognizer, TranscriptionClient};
use crate::audio::{CaptureLimits, record_phrase};
use crate::config::{AudioConfig, VadConfig};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info};

/// Records from the default (or configured) input device and transcribes
/// each phrase remotely.
pub struct MicrophoneRecognizer {
    audio: AudioConfig,
    vad: VadConfig,
    calibration: Duration,
    transcriber: TranscriptionClient,
}

impl MicrophoneRecognizer {
    /// Create a recognizer.
    pub fn new(
        audio: AudioConfig,
        vad: VadConfig,
        calibration: Duration,
        transcriber: TranscriptionClient,
    ) -> Self {
        Self {
            audio,
            vad,
            calibration,
            transcriber,
        }
    }
}

/// Sets the stop flag when dropped, so a cancelled capture frees the device.
struct StopOnDrop(Arc<AtomicBool>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

#[async_trait]
impl SpeechRecognizer for MicrophoneRecognizer {
    async fn capture(
        &mut self,
        timeout: Option<Duration>,
        phrase_time_limit: Option<Duration>,
    ) -> Capture {
        let audio = self.audio.clone();
        let vad = self.vad.clone();
        let limits = CaptureLimits {
            calibration: self.calibration,
            timeout,
            phrase_time_limit,
        };

        let stop = Arc::new(AtomicBool::new(false));
        let _guard = StopOnDrop(stop.clone());

        // cpal streams are not Send; keep the device on a blocking thread.
        let recorded =
            tokio::task::spawn_blocking(move || record_phrase(&audio, &vad, &limits, &stop))
                .await;

        let phrase = match recorded {
            Ok(Ok(Some(phrase))) => phrase,
            Ok(Ok(None)) => return Capture::Nothing,
            Ok(Err(e)) => {
                error!("Microphone error: {e}");
                return Capture::Nothing;
            }
            Err(e) => {
                error!("capture task failed: {e}");
                return Capture::Nothing;
            }
        };

        match self
            .transcriber
            .transcribe(&phrase.samples, phrase.sample_rate)
            .await
        {
            Ok(text) if text.is_empty() => {
                info!("Sorry, couldn't understand audio.");
                Capture::Nothing
            }
            Ok(text) => {
                info!("Heard: {text}");
                Capture::Heard(text)
            }
            Err(e) => {
                error!("Speech service error: {e}");
                Capture::Nothing
            }
        }
    }
}
