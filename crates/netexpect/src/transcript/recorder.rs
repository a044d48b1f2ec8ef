//! Transcript recording.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::error::{NetError, Result};

use super::format::render_entry;

/// Appends command/output pairs to a transcript file.
///
/// The file is owned exclusively by one session for its whole lifetime.
#[derive(Debug)]
pub struct Recorder {
    file: File,
}

impl Recorder {
    /// Open (creating or appending to) a transcript file.
    ///
    /// # Errors
    ///
    /// Returns the I/O error with the path as context if the file cannot be
    /// opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| NetError::io_context(format!("open transcript {}", path.display()), e))?;
        Ok(Self { file })
    }

    /// Append one command/output pair.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the write fails.
    pub fn append(&mut self, command: &str, output: &str) -> Result<()> {
        self.file
            .write_all(render_entry(command, output).as_bytes())
            .map_err(|e| NetError::io_context("append transcript entry", e))?;
        self.file
            .flush()
            .map_err(|e| NetError::io_context("flush transcript", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_entries_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.transcript");

        let mut recorder = Recorder::open(&path).unwrap();
        recorder.append("show clock", "12:00:00 UTC\n").unwrap();
        recorder.append("show users", "").unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let clock_pos = text.find("COMMAND:show clock").unwrap();
        let users_pos = text.find("COMMAND:show users").unwrap();
        assert!(clock_pos < users_pos);
    }

    #[test]
    fn unopenable_path_carries_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-subdir").join("session.transcript");

        let err = Recorder::open(&path).unwrap_err();
        assert!(matches!(err, NetError::IoWithContext { .. }));
        assert!(err.to_string().contains("missing-subdir"));
    }

    #[test]
    fn reopening_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.transcript");

        Recorder::open(&path).unwrap().append("first", "a\n").unwrap();
        Recorder::open(&path).unwrap().append("second", "b\n").unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("COMMAND:first"));
        assert!(text.contains("COMMAND:second"));
    }
}
