//! Microphone access via cpal.

pub mod capture;

pub use capture::{CaptureLimits, RecordedPhrase, list_input_devices, record_phrase};
