//! Voice activity detection using energy-based analysis.
//!
//! Uses RMS energy thresholding to find the start and end of one spoken
//! phrase. Durations are tracked in samples so results do not depend on
//! the audio callback's chunk size.

use crate::config::VadConfig;
use tracing::debug;

/// Why a phrase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhraseEnd {
    /// Trailing silence reached the configured window.
    Silence,
    /// The phrase time limit was hit while still speaking.
    TimeLimit,
}

/// Energy-based phrase detector for a single capture.
#[derive(Debug)]
pub struct PhraseDetector {
    /// Accumulated samples for the current phrase.
    speech_buffer: Vec<f32>,
    /// Whether speech onset has been seen.
    in_speech: bool,
    /// Consecutive silent samples since the last speech chunk.
    silence_samples: usize,
    /// Silent samples that end a phrase.
    silence_limit: usize,
    /// Phrases shorter than this are discarded.
    min_speech_samples: usize,
    /// Hard cap on phrase length.
    max_phrase_samples: Option<usize>,
    /// Effective RMS threshold.
    threshold: f32,
}

impl PhraseDetector {
    /// Create a detector for audio at `sample_rate`.
    ///
    /// `max_phrase_samples` bounds the phrase length (the phrase time limit).
    pub fn new(config: &VadConfig, sample_rate: u32, max_phrase_samples: Option<usize>) -> Self {
        let per_ms = |ms: u32| (ms as usize * sample_rate as usize) / 1000;
        Self {
            speech_buffer: Vec::new(),
            in_speech: false,
            silence_samples: 0,
            silence_limit: per_ms(config.min_silence_duration_ms).max(1),
            min_speech_samples: per_ms(config.min_speech_duration_ms),
            max_phrase_samples,
            threshold: config.threshold,
        }
    }

    /// Raise the threshold above a measured ambient noise level.
    pub fn calibrate(&mut self, ambient_rms: f32, multiplier: f32) {
        let floor = ambient_rms * multiplier;
        if floor > self.threshold {
            debug!(
                "VAD threshold raised from {:.4} to {floor:.4} by ambient noise",
                self.threshold
            );
            self.threshold = floor;
        }
    }

    /// Effective speech threshold.
    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Whether speech onset has been seen.
    #[must_use]
    pub fn in_speech(&self) -> bool {
        self.in_speech
    }

    /// Feed a chunk of mono samples.
    ///
    /// Returns `Some` once the phrase is complete. Phrases shorter than the
    /// minimum speech duration are dropped and detection starts over.
    pub fn push(&mut self, samples: &[f32]) -> Option<PhraseEnd> {
        let is_speech = compute_rms_energy(samples) > self.threshold;

        if is_speech {
            self.in_speech = true;
            self.silence_samples = 0;
            self.speech_buffer.extend_from_slice(samples);
        } else if self.in_speech {
            self.silence_samples += samples.len();
            // Still append silence within tolerance
            self.speech_buffer.extend_from_slice(samples);

            if self.silence_samples >= self.silence_limit {
                let voiced = self.speech_buffer.len().saturating_sub(self.silence_samples);
                if voiced >= self.min_speech_samples {
                    return Some(PhraseEnd::Silence);
                }
                debug!("discarding {voiced}-sample blip below minimum speech duration");
                self.reset();
                return None;
            }
        }

        if self.in_speech
            && let Some(max) = self.max_phrase_samples
            && self.speech_buffer.len() >= max
        {
            self.speech_buffer.truncate(max);
            return Some(PhraseEnd::TimeLimit);
        }

        None
    }

    /// Take the recorded phrase, leaving the detector empty.
    pub fn take_phrase(&mut self) -> Vec<f32> {
        let out = std::mem::take(&mut self.speech_buffer);
        self.reset();
        out
    }

    /// Reset detection state.
    pub fn reset(&mut self) {
        self.speech_buffer.clear();
        self.in_speech = false;
        self.silence_samples = 0;
    }
}

/// Compute RMS energy of audio samples.
#[must_use]
pub fn compute_rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}
