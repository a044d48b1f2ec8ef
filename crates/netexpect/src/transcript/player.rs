//! Transcript replay.
//!
//! Replay is strictly sequential: entries are consumed in recorded order and
//! a request for any other command is a hard [`sequence
//! mismatch`](crate::error::NetError::SequenceMismatch), never silently
//! resynchronized.

use std::collections::VecDeque;
use std::path::Path;

use crate::error::{NetError, Result};

use super::format::{COMMAND_PREFIX, DELIMITER, unescape};

/// Marker reported when a replay runs past the end of its transcript.
const END_OF_TRANSCRIPT: &str = "<end of transcript>";

/// Sequential consumer of a recorded transcript.
#[derive(Debug)]
pub struct Player {
    entries: VecDeque<(String, String)>,
}

impl Player {
    /// Load a transcript file.
    ///
    /// # Errors
    ///
    /// Returns the I/O error with the path as context if the file cannot be
    /// read, or a transcript error if a block is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| NetError::io_context(format!("read transcript {}", path.display()), e))?;
        Self::parse(&text)
    }

    /// Parse transcript text.
    ///
    /// # Errors
    ///
    /// Returns a transcript error on a malformed block.
    pub fn parse(text: &str) -> Result<Self> {
        let mut entries = VecDeque::new();
        let mut lines = text.lines().enumerate();

        while let Some((n, line)) = lines.next() {
            if line.is_empty() {
                continue;
            }
            let Some(command) = line.strip_prefix(COMMAND_PREFIX) else {
                return Err(NetError::transcript(format!(
                    "line {}: expected {COMMAND_PREFIX} block, found {line:?}",
                    n + 1
                )));
            };

            expect_delimiter(&mut lines, command)?;
            let Some((_, output_line)) = lines.next() else {
                return Err(NetError::transcript(format!(
                    "truncated block for command {command:?}: missing output line"
                )));
            };
            expect_delimiter(&mut lines, command)?;

            entries.push_back((command.to_string(), unescape(output_line)));
        }

        Ok(Self { entries })
    }

    /// Number of entries not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.entries.len()
    }

    /// Consume the next entry, verifying it matches the requested command.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::SequenceMismatch`] if the next recorded command
    /// differs from `expected_command` or the transcript is exhausted.
    pub fn next(&mut self, expected_command: &str) -> Result<String> {
        let Some((command, _)) = self.entries.front() else {
            return Err(NetError::sequence_mismatch(expected_command, END_OF_TRANSCRIPT));
        };

        if command != expected_command {
            return Err(NetError::sequence_mismatch(expected_command, command.clone()));
        }

        self.entries
            .pop_front()
            .map(|(_, output)| output)
            .ok_or_else(|| NetError::sequence_mismatch(expected_command, END_OF_TRANSCRIPT))
    }
}

fn expect_delimiter<'a>(
    lines: &mut impl Iterator<Item = (usize, &'a str)>,
    command: &str,
) -> Result<()> {
    match lines.next() {
        Some((_, line)) if line == DELIMITER => Ok(()),
        Some((n, line)) => Err(NetError::transcript(format!(
            "line {}: expected delimiter in block for {command:?}, found {line:?}",
            n + 1
        ))),
        None => Err(NetError::transcript(format!(
            "truncated block for command {command:?}: missing delimiter"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::super::format::render_entry;
    use super::*;

    fn transcript(pairs: &[(&str, &str)]) -> String {
        pairs.iter().map(|(c, o)| render_entry(c, o)).collect()
    }

    #[test]
    fn replays_in_order() {
        let text = transcript(&[("show clock", "12:00:00 UTC\n"), ("show users", "")]);
        let mut player = Player::parse(&text).unwrap();

        assert_eq!(player.remaining(), 2);
        assert_eq!(player.next("show clock").unwrap(), "12:00:00 UTC\n");
        assert_eq!(player.next("show users").unwrap(), "");
        assert_eq!(player.remaining(), 0);
    }

    #[test]
    fn out_of_order_is_sequence_mismatch() {
        let text = transcript(&[("show clock", "x\n"), ("show users", "y\n")]);
        let mut player = Player::parse(&text).unwrap();

        let err = player.next("show users").unwrap_err();
        assert!(matches!(err, NetError::SequenceMismatch { .. }));
        // The mismatch does not consume the entry
        assert_eq!(player.remaining(), 2);
    }

    #[test]
    fn exhausted_transcript_is_sequence_mismatch() {
        let text = transcript(&[("show clock", "x\n")]);
        let mut player = Player::parse(&text).unwrap();
        player.next("show clock").unwrap();

        let err = player.next("show clock").unwrap_err();
        assert!(matches!(err, NetError::SequenceMismatch { .. }));
    }

    #[test]
    fn multi_line_output_round_trips() {
        let output = "Cisco IOS\nVersion 15.2\nuptime 3 weeks\n";
        let text = transcript(&[("show version", output)]);
        let mut player = Player::parse(&text).unwrap();
        assert_eq!(player.next("show version").unwrap(), output);
    }

    #[test]
    fn malformed_block_is_rejected() {
        assert!(Player::parse("not a transcript\n").is_err());
        assert!(Player::parse("COMMAND:show clock\n").is_err());
    }

    #[test]
    fn missing_file_carries_path_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never-recorded.transcript");

        let err = Player::load(&path).unwrap_err();
        assert!(matches!(err, NetError::IoWithContext { .. }));
        assert!(err.to_string().contains("never-recorded"));
    }

    #[test]
    fn blank_lines_between_blocks_are_tolerated() {
        let text = format!("{}\n{}", render_entry("a", "1\n"), render_entry("b", "2\n"));
        let mut player = Player::parse(&text).unwrap();
        assert_eq!(player.next("a").unwrap(), "1\n");
        assert_eq!(player.next("b").unwrap(), "2\n");
    }
}
