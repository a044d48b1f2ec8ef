//! Prompt detection.
//!
//! The prompt is discovered empirically: send a bare carriage return, read
//! the next settled line, and repeat until two consecutive probes return the
//! same non-empty line. Requiring two identical reads is the simplest fixed
//! point that survives banner noise and partial retransmits.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::config::PROMPT_RETRY_BOUND;
use crate::error::{NetError, Result};

use super::handle::{ReadOutcome, Session};

/// Characters that end a prompt anchor.
const ANCHOR_BOUNDARY: [char; 4] = ['#', '>', '$', '%'];

/// Trim a stable prompt line to its anchor: everything through the first
/// boundary character, or the whole trimmed line if none appears.
fn trim_to_anchor(line: &str) -> String {
    match line.find(ANCHOR_BOUNDARY) {
        Some(pos) => {
            let end = pos + line[pos..].chars().next().map_or(1, char::len_utf8);
            line[..end].to_string()
        }
        None => line.trim_end().to_string(),
    }
}

impl<T> Session<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Detect the device command prompt.
    ///
    /// Probes with bare carriage returns until the trailing line stabilizes,
    /// then stores and returns the trimmed anchor. A prompt that changes with
    /// device mode (e.g. after `enable`) must be redetected by calling this
    /// again.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::NoPromptFound`] if no stable repeat occurs within
    /// the retry bound, or [`NetError::SessionClosed`] on EOF.
    pub async fn detect_prompt(&mut self) -> Result<String> {
        self.drain_pending();
        let mut previous: Option<String> = None;

        for _ in 0..PROMPT_RETRY_BOUND {
            self.send("\r").await?;
            let line = self.read_settled_line().await?;

            if !line.is_empty() && previous.as_deref() == Some(line.as_str()) {
                let anchor = trim_to_anchor(&line);
                debug!(address = %self.config.address, prompt = %anchor, "prompt detected");
                self.prompt = Some(anchor.clone());
                return Ok(anchor);
            }

            previous = Some(line);
        }

        Err(NetError::NoPromptFound {
            attempts: PROMPT_RETRY_BOUND,
        })
    }

    /// Read until the stream goes quiet for one settle window, then return
    /// the last non-empty line received.
    async fn read_settled_line(&mut self) -> Result<String> {
        let settle = self.config.timeouts.settle;
        loop {
            match self.read_more(settle).await? {
                ReadOutcome::Data => {}
                ReadOutcome::Timeout => break,
                ReadOutcome::Eof => {
                    if self.pending.trim().is_empty() {
                        return Err(NetError::SessionClosed);
                    }
                    break;
                }
            }
        }

        let line = self
            .pending
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("")
            .trim_end()
            .to_string();
        self.drain_pending();
        Ok(line)
    }
}
