//! Line-based recognizer for typed input.

use super::{Capture, SpeechRecognizer};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tracing::{error, info};

/// Reads one utterance per line. Used by `--text` and in tests.
pub struct TextRecognizer<R> {
    reader: R,
}

impl TextRecognizer<BufReader<Stdin>> {
    /// Recognizer over standard input.
    #[must_use]
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin + Send> TextRecognizer<R> {
    /// Recognizer over any buffered reader.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    async fn read_line(&mut self) -> Capture {
        let mut line = String::new();
        match self.reader.read_line(&mut line).await {
            Ok(0) => Capture::Closed,
            Ok(_) => {
                let text = line.trim();
                if text.is_empty() {
                    Capture::Nothing
                } else {
                    info!("Heard: {text}");
                    Capture::Heard(text.to_owned())
                }
            }
            Err(e) => {
                error!("input read failed: {e}");
                Capture::Closed
            }
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> SpeechRecognizer for TextRecognizer<R> {
    async fn capture(
        &mut self,
        timeout: Option<Duration>,
        _phrase_time_limit: Option<Duration>,
    ) -> Capture {
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, self.read_line()).await {
                Ok(capture) => capture,
                Err(_) => {
                    info!("No speech detected (timeout).");
                    Capture::Nothing
                }
            },
            None => self.read_line().await,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[tokio::test]
    async fn yields_lines_then_closes() {
        let input: &[u8] = b"play some music\n\n  volume up  \n";
        let mut rec = TextRecognizer::new(input);

        assert_eq!(
            rec.capture(None, None).await,
            Capture::Heard("play some music".into())
        );
        assert_eq!(rec.capture(None, None).await, Capture::Nothing);
        assert_eq!(
            rec.capture(None, None).await,
            Capture::Heard("volume up".into())
        );
        assert_eq!(rec.capture(None, None).await, Capture::Closed);
    }

    #[tokio::test]
    async fn times_out_when_no_line_arrives() {
        let (client, server) = tokio::io::duplex(64);
        let mut rec = TextRecognizer::new(BufReader::new(server));

        let capture = rec.capture(Some(Duration::from_millis(20)), None).await;
        assert_eq!(capture, Capture::Nothing);
        drop(client);
    }
}
