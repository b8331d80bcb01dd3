//! Text-to-speech output.
//!
//! Speech goes through the platform synthesizer when one is installed
//! (`say` on macOS, `espeak-ng`/`espeak` elsewhere). Without one, replies
//! are printed to the console.

mod command;
mod console;

pub use command::{CommandSpeaker, SynthFlavor, find_synthesizer};
pub use console::ConsoleSpeaker;

use crate::config::{TtsBackend, TtsConfig};
use crate::error::{CraxError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

/// Speaks a line of text.
#[async_trait]
pub trait Speaker: Send {
    /// Speak `text`. When `wait` is true, return only after playback ends.
    ///
    /// Empty text is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CraxError::Tts`] if the synthesizer cannot be run.
    async fn speak(&mut self, text: &str, wait: bool) -> Result<()>;
}

/// Build the speaker selected by `config`.
///
/// # Errors
///
/// Returns [`CraxError::Tts`] when the `command` backend is requested and
/// no synthesizer can be found.
pub fn speaker_from_config(config: &TtsConfig) -> Result<Box<dyn Speaker>> {
    let program = config.program.as_ref().map(PathBuf::from);
    match config.backend {
        TtsBackend::Console => Ok(Box::new(ConsoleSpeaker::stdout())),
        TtsBackend::Command => {
            let path = program
                .or_else(find_synthesizer)
                .ok_or_else(|| CraxError::Tts("no speech synthesizer found on PATH".into()))?;
            Ok(Box::new(CommandSpeaker::from_config(path, config)))
        }
        TtsBackend::Auto => match program.or_else(find_synthesizer) {
            Some(path) => Ok(Box::new(CommandSpeaker::from_config(path, config))),
            None => {
                info!("no speech synthesizer found, replies will be printed");
                Ok(Box::new(ConsoleSpeaker::stdout()))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn console_backend_never_fails() {
        let config = TtsConfig {
            backend: TtsBackend::Console,
            ..TtsConfig::default()
        };
        assert!(speaker_from_config(&config).is_ok());
    }

    #[test]
    fn explicit_program_satisfies_command_backend() {
        let config = TtsConfig {
            backend: TtsBackend::Command,
            program: Some("/usr/bin/espeak-ng".into()),
            ..TtsConfig::default()
        };
        assert!(speaker_from_config(&config).is_ok());
    }
}
