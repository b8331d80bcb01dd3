//! Speech through an external synthesizer program.

use super::Speaker;
use crate::config::TtsConfig;
use crate::error::{CraxError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Synthesizers probed on `PATH`, in order.
const SYNTHESIZERS: &[&str] = &["say", "espeak-ng", "espeak"];

/// Command-line dialect of a synthesizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthFlavor {
    /// macOS `say`: `-v voice -r wpm`.
    Say,
    /// eSpeak family: `-v voice -s wpm`.
    Espeak,
}

impl SynthFlavor {
    /// Guess the dialect from the program's file name.
    #[must_use]
    pub fn detect(program: &Path) -> Self {
        match program.file_stem().and_then(|s| s.to_str()) {
            Some("say") => Self::Say,
            _ => Self::Espeak,
        }
    }
}

/// First synthesizer found on `PATH`.
#[must_use]
pub fn find_synthesizer() -> Option<PathBuf> {
    SYNTHESIZERS.iter().find_map(|name| which::which(name).ok())
}

/// Runs one synthesizer process per line.
///
/// A non-waiting `speak` leaves the process running; the next call waits
/// for it first so lines never overlap.
pub struct CommandSpeaker {
    program: PathBuf,
    flavor: SynthFlavor,
    voice: Option<String>,
    rate: Option<u32>,
    pending: Option<Child>,
}

impl CommandSpeaker {
    /// Speaker that runs `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        Self {
            flavor: SynthFlavor::detect(&program),
            program,
            voice: None,
            rate: None,
            pending: None,
        }
    }

    /// Speaker for `program` with voice and rate from `config`.
    pub fn from_config(program: impl Into<PathBuf>, config: &TtsConfig) -> Self {
        let mut speaker = Self::new(program);
        speaker.voice = config.voice.clone();
        speaker.rate = config.rate;
        debug!(
            "TTS via {} ({:?})",
            speaker.program.display(),
            speaker.flavor
        );
        speaker
    }

    /// Arguments for speaking `text`.
    #[must_use]
    pub fn args(&self, text: &str) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(ref voice) = self.voice {
            args.push("-v".to_owned());
            args.push(voice.clone());
        }
        if let Some(rate) = self.rate {
            args.push(
                match self.flavor {
                    SynthFlavor::Say => "-r",
                    SynthFlavor::Espeak => "-s",
                }
                .to_owned(),
            );
            args.push(rate.to_string());
        }
        args.push("--".to_owned());
        args.push(text.to_owned());
        args
    }

    async fn finish_pending(&mut self) {
        if let Some(mut child) = self.pending.take()
            && let Err(e) = child.wait().await
        {
            warn!("previous synthesizer process failed: {e}");
        }
    }
}

#[async_trait]
impl Speaker for CommandSpeaker {
    async fn speak(&mut self, text: &str, wait: bool) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.finish_pending().await;

        let mut child = Command::new(&self.program)
            .args(self.args(text))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                CraxError::Tts(format!("failed to run {}: {e}", self.program.display()))
            })?;

        if !wait {
            self.pending = Some(child);
            return Ok(());
        }

        let status = child
            .wait()
            .await
            .map_err(|e| CraxError::Tts(format!("synthesizer did not finish: {e}")))?;
        if !status.success() {
            return Err(CraxError::Tts(format!(
                "{} exited with {status}",
                self.program.display()
            )));
        }
        Ok(())
    }
}
