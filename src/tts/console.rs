//! Console fallback speaker.

use super::Speaker;
use crate::error::Result;
use async_trait::async_trait;
use std::io::Write;

/// Writes `Assistant: <text>` lines instead of speaking.
pub struct ConsoleSpeaker<W> {
    out: W,
}

impl ConsoleSpeaker<std::io::Stdout> {
    /// Speaker that prints to standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleSpeaker<W> {
    /// Speaker that writes to `out`.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Consume the speaker and return the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

#[async_trait]
impl<W: Write + Send> Speaker for ConsoleSpeaker<W> {
    async fn speak(&mut self, text: &str, _wait: bool) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        writeln!(self.out, "Assistant: {text}")?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[tokio::test]
    async fn prints_prefixed_lines() {
        let mut speaker = ConsoleSpeaker::new(Vec::new());
        speaker.speak("Playing music now.", true).await.unwrap();
        speaker.speak("", true).await.unwrap();
        speaker.speak("Goodbye!", false).await.unwrap();

        let out = String::from_utf8(speaker.into_inner()).unwrap();
        assert_eq!(out, "Assistant: Playing music now.\nAssistant: Goodbye!\n");
    }
}
