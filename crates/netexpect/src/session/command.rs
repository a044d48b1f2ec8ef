//! Command execution.
//!
//! Sends one command line and collects output until the known prompt returns
//! at the start of a line. Pagination prompts are answered with a single
//! space, caller-supplied answer tables handle confirmations and wizards, and
//! a prompt-shaped line with output still ahead of it is only trusted after a
//! confirming carriage return. The stall timeout bounds silence, not total
//! duration: it resets whenever data arrives.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::config::PROMPT_RETRY_BOUND;
use crate::error::{NetError, Result};
use crate::pattern::{AnswerAction, AnswerTable};

use super::handle::{ReadOutcome, Session};

/// Result of one command call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandReply {
    /// The command completed at a confirmed prompt boundary. An empty string
    /// is a legitimate result for a command with no output.
    Output(String),

    /// Completion could not be confirmed: the stream stalled past the
    /// command timeout without a prompt boundary. Distinct from empty output
    /// and deliberately not an error; the caller decides how to treat it.
    Unconfirmed,
}

impl CommandReply {
    /// Whether completion could not be confirmed.
    #[must_use]
    pub const fn is_unconfirmed(&self) -> bool {
        matches!(self, Self::Unconfirmed)
    }

    /// The output text, if the command completed.
    #[must_use]
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Output(text) => Some(text),
            Self::Unconfirmed => None,
        }
    }

    /// Consume into the output text, if the command completed.
    #[must_use]
    pub fn into_output(self) -> Option<String> {
        match self {
            Self::Output(text) => Some(text),
            Self::Unconfirmed => None,
        }
    }
}

/// Locate the prompt at the tail of the buffer: the occurrence must sit at a
/// line start with nothing but whitespace after it.
fn find_prompt_boundary(pending: &str, prompt: &str) -> Option<usize> {
    let idx = pending.rfind(prompt)?;
    let at_line_start = idx == 0 || pending.as_bytes()[idx - 1] == b'\n';
    let tail = &pending[idx + prompt.len()..];
    (at_line_start && tail.trim().is_empty()).then_some(idx)
}

/// Strip the device's echo of the submitted command and the newline that
/// separated the output from the trailing prompt.
fn strip_echo(command: &str, collected: &str) -> String {
    let mut text = collected;
    if let Some(rest) = text.strip_prefix(command) {
        text = rest;
    }
    if let Some(rest) = text.strip_prefix('\n') {
        text = rest;
    }
    text.strip_suffix('\n').unwrap_or(text).to_string()
}

impl<T> Session<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Run a command and collect its output.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::NotReady`] if prompt detection has not run,
    /// [`NetError::SequenceMismatch`] in replay mode for an out-of-order
    /// command, or an I/O error from the transport.
    pub async fn command(&mut self, command: &str) -> Result<CommandReply> {
        self.command_with(command, &AnswerTable::new()).await
    }

    /// Run a command with an answer table for non-standard prompts.
    ///
    /// Table entries are evaluated in insertion order on every new chunk of
    /// output; the first match wins. See [`AnswerTable`] for the actions.
    ///
    /// Prompt-shaped lines at the tail of the output are treated as candidate
    /// completion boundaries and consumed during confirmation: an output line
    /// that exactly matches the detected prompt will not appear in the
    /// returned text.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Session::command`].
    pub async fn command_with(
        &mut self,
        command: &str,
        answers: &AnswerTable,
    ) -> Result<CommandReply> {
        // Replay mode bypasses the live transport entirely.
        if let Some(player) = &mut self.player {
            return player.next(command).map(CommandReply::Output);
        }

        if self.closed {
            return Err(NetError::SessionClosed);
        }
        let Some(prompt) = self.prompt.clone() else {
            return Err(NetError::NotReady);
        };

        self.drain_pending();
        self.send_line(command).await?;

        let stall = self.config.timeouts.command;
        let mut collected = String::new();
        let mut confirmations = 0usize;

        loop {
            // 1. Caller-supplied answers take precedence, first match wins.
            if let Some((m, action)) = answers.find_match(&self.pending) {
                let action = action.clone();
                collected.push_str(&self.pending[..m.start]);
                self.consume_pending(m.end);
                match action {
                    AnswerAction::Respond(text) => self.send(&text).await?,
                    AnswerAction::ReturnImmediately => {
                        return self.finish(command, &collected);
                    }
                    AnswerAction::Continue => {}
                }
                continue;
            }

            // 2. Pagination: answer with a single space, marker excluded
            // from the output.
            if let Some(m) = self.prompts.pagination.matches(&self.pending) {
                collected.push_str(&self.pending[..m.start]);
                self.consume_pending(m.end);
                self.send(" ").await?;
                continue;
            }

            // 3. Prompt boundary at the buffer tail.
            if let Some(idx) = find_prompt_boundary(&self.pending, &prompt) {
                let before = &self.pending[..idx];
                if before.trim().is_empty() {
                    // Genuine idle prompt: nothing pending ahead of it.
                    return self.finish(command, &collected);
                }

                // Output precedes the prompt-shaped line, so it may be noise
                // that merely resembles the prompt. Confirm with one more
                // carriage return, bounded so prompt-shaped noise cannot
                // loop forever.
                collected.push_str(before);
                self.drain_pending();
                confirmations += 1;
                if confirmations >= PROMPT_RETRY_BOUND {
                    debug!(address = %self.config.address, %command, "prompt confirmation bound hit");
                    return Ok(CommandReply::Unconfirmed);
                }
                self.send("\r").await?;
                continue;
            }

            // 4. Nothing matched: wait for more data, bounded by the stall
            // timeout.
            match self.read_more(stall).await? {
                ReadOutcome::Data => {}
                ReadOutcome::Timeout => {
                    debug!(address = %self.config.address, %command, "command stalled");
                    return Ok(CommandReply::Unconfirmed);
                }
                ReadOutcome::Eof => {
                    self.closed = true;
                    return Ok(CommandReply::Unconfirmed);
                }
            }
        }
    }

    fn finish(&mut self, command: &str, collected: &str) -> Result<CommandReply> {
        self.drain_pending();
        let output = strip_echo(command, collected);
        self.record(command, &output)?;
        Ok(CommandReply::Output(output))
    }
}
