//! Microphone capture of a single phrase using cpal.
//!
//! The microphone is held only for the duration of one [`record_phrase`]
//! call: the input stream is opened, calibrated against ambient noise,
//! drained until the phrase detector fires, and dropped. Audio is captured
//! at the device's native rate and downsampled to the configured rate.
//!
//! Capture runs on a blocking thread. The caller's stop flag is polled
//! every [`POLL_INTERVAL`] so an abandoned capture releases the device.

use crate::config::{AudioConfig, VadConfig};
use crate::error::{CraxError, Result};
use crate::vad::{PhraseDetector, PhraseEnd, compute_rms_energy};
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// How long to block on the audio channel between deadline checks.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Channel depth between the audio callback and the capture loop.
const AUDIO_CHANNEL_SIZE: usize = 256;

/// Limits for one capture.
#[derive(Debug, Clone)]
pub struct CaptureLimits {
    /// Ambient noise calibration window.
    pub calibration: Duration,
    /// How long to wait for speech to start. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Maximum phrase length. `None` is unbounded.
    pub phrase_time_limit: Option<Duration>,
}

/// A recorded phrase at the configured sample rate.
#[derive(Debug, Clone)]
pub struct RecordedPhrase {
    /// Mono samples.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Why recording stopped.
    pub end: PhraseEnd,
}

/// Record one phrase from the microphone. Blocking.
///
/// Returns `Ok(None)` when no speech starts before `limits.timeout`, or
/// once `stop` is set.
///
/// # Errors
///
/// Returns an error if no input device is available or the stream cannot
/// be opened.
pub fn record_phrase(
    audio: &AudioConfig,
    vad: &VadConfig,
    limits: &CaptureLimits,
    stop: &AtomicBool,
) -> Result<Option<RecordedPhrase>> {
    let device = open_input_device(audio)?;

    // Use the device's default config for best compatibility
    let default_config = device
        .default_input_config()
        .map_err(|e| CraxError::Audio(format!("no default input config: {e}")))?;

    let native_rate = default_config.sample_rate();
    let native_channels = default_config.channels();
    let target_rate = audio.input_sample_rate;

    let stream_config = StreamConfig {
        channels: native_channels,
        sample_rate: native_rate,
        buffer_size: cpal::BufferSize::Default,
    };

    let (tx, rx) = mpsc::sync_channel::<Vec<f32>>(AUDIO_CHANNEL_SIZE);

    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                // Convert to mono if needed
                let mono = if native_channels > 1 {
                    to_mono(data, native_channels)
                } else {
                    data.to_vec()
                };
                let samples = if native_rate != target_rate {
                    downsample(&mono, native_rate, target_rate)
                } else {
                    mono
                };
                // Use try_send to avoid blocking the audio thread
                if tx.try_send(samples).is_err() {
                    debug!("audio channel full, dropping chunk");
                }
            },
            move |err| {
                error!("audio input stream error: {err}");
            },
            None,
        )
        .map_err(|e| CraxError::Audio(format!("failed to build input stream: {e}")))?;

    stream
        .play()
        .map_err(|e| CraxError::Audio(format!("failed to start input stream: {e}")))?;

    debug!(
        "microphone open: native {}Hz x{} -> target {}Hz",
        native_rate, native_channels, target_rate
    );

    let result = drain_phrase(&rx, vad, target_rate, limits, stop);

    drop(stream);
    debug!("microphone released");
    result
}

/// Run calibration and phrase detection over a stream of audio chunks.
///
/// Split from [`record_phrase`] so the timing logic can be exercised
/// without a device.
pub(crate) fn drain_phrase(
    rx: &mpsc::Receiver<Vec<f32>>,
    vad: &VadConfig,
    sample_rate: u32,
    limits: &CaptureLimits,
    stop: &AtomicBool,
) -> Result<Option<RecordedPhrase>> {
    let max_samples = limits
        .phrase_time_limit
        .map(|d| (d.as_secs_f64() * f64::from(sample_rate)) as usize);
    let mut detector = PhraseDetector::new(vad, sample_rate, max_samples);

    // Ambient noise calibration.
    let calibration_samples = (limits.calibration.as_secs_f64() * f64::from(sample_rate)) as usize;
    let mut ambient = Vec::with_capacity(calibration_samples);
    let calibration_deadline = Instant::now() + limits.calibration + POLL_INTERVAL;
    while ambient.len() < calibration_samples && Instant::now() < calibration_deadline {
        if stop.load(Ordering::Relaxed) {
            debug!("capture stopped during calibration");
            return Ok(None);
        }
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(chunk) => ambient.extend_from_slice(&chunk),
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(CraxError::Audio("input stream closed".into()));
            }
        }
    }
    if !ambient.is_empty() {
        detector.calibrate(compute_rms_energy(&ambient), vad.noise_multiplier);
    }

    info!("Listening...");
    let listen_start = Instant::now();
    loop {
        if stop.load(Ordering::Relaxed) {
            debug!("capture stopped");
            return Ok(None);
        }
        if !detector.in_speech()
            && let Some(timeout) = limits.timeout
            && listen_start.elapsed() >= timeout
        {
            info!("No speech detected (timeout).");
            return Ok(None);
        }

        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(chunk) => {
                if let Some(end) = detector.push(&chunk) {
                    let samples = detector.take_phrase();
                    debug!(
                        "phrase captured: {:.1}s ({end:?})",
                        samples.len() as f32 / sample_rate as f32
                    );
                    return Ok(Some(RecordedPhrase {
                        samples,
                        sample_rate,
                        end,
                    }));
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(CraxError::Audio("input stream closed".into()));
            }
        }
    }
}

fn open_input_device(audio: &AudioConfig) -> Result<cpal::Device> {
    let host = cpal::default_host();

    let device = if let Some(ref name) = audio.input_device {
        host.input_devices()
            .map_err(|e| CraxError::Audio(format!("cannot enumerate devices: {e}")))?
            .find(|d| {
                d.description()
                    .ok()
                    .map(|desc| desc.name() == name)
                    .unwrap_or(false)
            })
            .ok_or_else(|| CraxError::Audio(format!("input device '{name}' not found")))?
    } else {
        host.default_input_device()
            .ok_or_else(|| CraxError::Audio("no default input device".into()))?
    };

    Ok(device)
}

/// List available input devices.
///
/// # Errors
///
/// Returns an error if devices cannot be enumerated.
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| CraxError::Audio(format!("cannot enumerate devices: {e}")))?;

    let mut names = Vec::new();
    for device in devices {
        if let Ok(desc) = device.description() {
            names.push(desc.name().to_owned());
        }
    }
    Ok(names)
}

/// Convert interleaved multi-channel audio to mono by averaging channels.
fn to_mono(data: &[f32], channels: u16) -> Vec<f32> {
    let ch = channels as usize;
    data.chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Simple linear-interpolation downsampler.
///
/// Speech energy sits below 8 kHz, so no anti-alias filter is applied.
fn downsample(samples: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if src_rate == dst_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = src_rate as f64 / dst_rate as f64;
    let out_len = (samples.len() as f64 / ratio) as usize;
    let mut output = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_pos = i as f64 * ratio;
        let idx = src_pos as usize;
        let frac = src_pos - idx as f64;

        let sample = if idx + 1 < samples.len() {
            samples[idx] as f64 * (1.0 - frac) + samples[idx + 1] as f64 * frac
        } else {
            samples[idx.min(samples.len() - 1)] as f64
        };

        output.push(sample as f32);
    }

    output
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn vad() -> VadConfig {
        VadConfig {
            threshold: 0.01,
            noise_multiplier: 1.5,
            min_silence_duration_ms: 100,
            min_speech_duration_ms: 50,
        }
    }

    fn limits(timeout: Option<Duration>) -> CaptureLimits {
        CaptureLimits {
            calibration: Duration::ZERO,
            timeout,
            phrase_time_limit: Some(Duration::from_secs(8)),
        }
    }

    #[test]
    fn to_mono_averages_channels() {
        assert_eq!(to_mono(&[0.5, 0.25, -1.0, 1.0], 2), vec![0.375, 0.0]);
    }

    #[test]
    fn downsample_halves_length() {
        let input: Vec<f32> = (0..480).map(|i| i as f32).collect();
        let out = downsample(&input, 48_000, 16_000);
        assert_eq!(out.len(), 160);
        assert_eq!(out[1], 3.0);
    }

    #[test]
    fn downsample_same_rate_is_identity() {
        assert_eq!(downsample(&[0.1, 0.2], 16_000, 16_000), vec![0.1, 0.2]);
    }

    #[test]
    fn drain_returns_phrase_after_silence() {
        let (tx, rx) = mpsc::sync_channel(16);
        tx.send(vec![0.2; 1600]).unwrap();
        tx.send(vec![0.0; 1600]).unwrap();

        let phrase = drain_phrase(&rx, &vad(), 16_000, &limits(None), &AtomicBool::new(false))
            .unwrap()
            .unwrap();
        assert_eq!(phrase.samples.len(), 3200);
        assert_eq!(phrase.end, PhraseEnd::Silence);
    }

    #[test]
    fn drain_times_out_without_speech() {
        let (tx, rx) = mpsc::sync_channel::<Vec<f32>>(16);
        tx.send(vec![0.0; 1600]).unwrap();

        let result = drain_phrase(
            &rx,
            &vad(),
            16_000,
            &limits(Some(Duration::from_millis(150))),
            &AtomicBool::new(false),
        );
        assert!(result.unwrap().is_none());
        drop(tx);
    }

    #[test]
    fn drain_reports_closed_stream() {
        let (tx, rx) = mpsc::sync_channel::<Vec<f32>>(1);
        drop(tx);
        assert!(matches!(
            drain_phrase(&rx, &vad(), 16_000, &limits(None), &AtomicBool::new(false)),
            Err(CraxError::Audio(_))
        ));
    }

    #[test]
    fn drain_returns_once_stopped_with_stream_open() {
        let (tx, rx) = mpsc::sync_channel::<Vec<f32>>(16);
        let stop = std::sync::Arc::new(AtomicBool::new(false));

        let flag = stop.clone();
        let setter = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            flag.store(true, Ordering::Relaxed);
        });

        let start = Instant::now();
        let result = drain_phrase(&rx, &vad(), 16_000, &limits(None), &stop);
        assert!(result.unwrap().is_none());
        assert!(start.elapsed() < Duration::from_secs(1));

        setter.join().unwrap();
        // The sender is still alive: only the flag ended the capture.
        drop(tx);
    }

    #[test]
    fn drain_stops_during_calibration() {
        let (_tx, rx) = mpsc::sync_channel::<Vec<f32>>(16);
        let limits = CaptureLimits {
            calibration: Duration::from_secs(5),
            timeout: None,
            phrase_time_limit: None,
        };
        let start = Instant::now();
        let result = drain_phrase(&rx, &vad(), 16_000, &limits, &AtomicBool::new(true));
        assert!(result.unwrap().is_none());
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
