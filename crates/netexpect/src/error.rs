//! Error types for netexpect.
//!
//! This module defines all error types used throughout the library.
//! Errors are designed to be informative, providing context about what went
//! wrong and including relevant data for debugging (e.g., buffer contents
//! when a login phase fails).

use std::time::Duration;

use thiserror::Error;

/// Maximum length of buffer content to display in error messages.
const MAX_BUFFER_DISPLAY: usize = 500;

/// Format captured session output for display, truncating if necessary.
fn format_buffer_snippet(buffer: &str) -> String {
    if buffer.is_empty() {
        return "(empty buffer)".to_string();
    }

    if buffer.len() <= MAX_BUFFER_DISPLAY {
        return format!(
            "┌─ buffer ({} bytes) ──────────────────────\n│ {}\n└────────────────────────────────────────",
            buffer.len(),
            buffer.lines().collect::<Vec<_>>().join("\n│ ")
        );
    }

    // Large buffer - show the tail, which is where the failed phase stalled
    let lines: Vec<&str> = buffer.lines().collect();
    let tail_lines = &lines[lines.len().saturating_sub(6)..];
    let hidden = lines.len() - tail_lines.len();

    format!(
        "┌─ buffer ({} bytes, {} lines) ─────────────\n│ ... ({} lines hidden)\n│ {}\n└────────────────────────────────────────",
        buffer.len(),
        lines.len(),
        hidden,
        tail_lines.join("\n│ ")
    )
}

/// The main error type for netexpect operations.
#[derive(Debug, Error)]
pub enum NetError {
    /// Failed to spawn a process.
    #[error("failed to spawn process: {0}")]
    Spawn(#[from] SpawnError),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An I/O error occurred with additional context.
    #[error("{context}: {source}")]
    IoWithContext {
        /// What operation was being performed.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// All spawn templates and retries were exhausted without a working
    /// session.
    #[error("connect failed after {attempts} attempts: {last_error}")]
    ConnectFailed {
        /// Total spawn attempts made.
        attempts: usize,
        /// The last recorded per-attempt failure.
        last_error: String,
    },

    /// No username/password/command prompt appeared within the login timeout.
    #[error("no initial prompt within {timeout:?}\n{}", format_buffer_snippet(buffer))]
    NoFirstPrompt {
        /// The login timeout that elapsed.
        timeout: Duration,
        /// Output received while waiting.
        buffer: String,
    },

    /// The connection was refused, reset, or rejected before login.
    #[error("connection rejected by remote side: {banner}")]
    BadOpen {
        /// The banner or error line that matched the bad-open pattern.
        banner: String,
    },

    /// The device rejected the supplied password.
    #[error("authentication failed: password rejected")]
    BadPassword,

    /// No password sub-prompt appeared after sending the enable command.
    #[error("no enable password prompt after enable command")]
    NoEnablePrompt,

    /// The device rejected the enable password.
    #[error("enable failed: privileged-mode password rejected")]
    EnableFailed,

    /// Prompt detection exhausted its retry bound without two stable reads.
    #[error("no stable prompt found after {attempts} attempts")]
    NoPromptFound {
        /// Number of carriage-return probes sent.
        attempts: usize,
    },

    /// A command was issued against a session with no detected prompt.
    #[error("session is not at a known prompt; run prompt detection first")]
    NotReady,

    /// The replay transcript's next entry does not match the requested
    /// command. Replay is strictly sequential and never resynchronized.
    #[error("replay sequence mismatch: expected command {expected:?}, transcript has {found:?}")]
    SequenceMismatch {
        /// The command the caller asked for.
        expected: String,
        /// The command recorded next in the transcript.
        found: String,
    },

    /// A transcript file could not be read or parsed.
    #[error("transcript error: {message}")]
    Transcript {
        /// Description of the problem.
        message: String,
    },

    /// A spawn-command template could not be rendered.
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid regex pattern.
    #[error("invalid regex pattern: {0}")]
    Regex(#[from] regex::Error),

    /// Session is closed.
    #[error("session is closed")]
    SessionClosed,

    /// Batch driver error (work list or child management).
    #[error("batch error: {message}")]
    Batch {
        /// Description of the batch-level failure.
        message: String,
    },
}

/// Errors related to process spawning.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// Command not found.
    #[error("command not found: {command}")]
    CommandNotFound {
        /// The command that was not found.
        command: String,
    },

    /// PTY allocation failed.
    #[error("failed to allocate PTY: {reason}")]
    PtyAllocation {
        /// The reason for the failure.
        reason: String,
    },

    /// Failed to set up the controlling terminal.
    #[error("failed to set up terminal: {reason}")]
    TerminalSetup {
        /// The reason for the failure.
        reason: String,
    },

    /// The spawn command line was empty after template rendering.
    #[error("empty spawn command")]
    EmptyCommand,

    /// General I/O error during spawn.
    #[error("I/O error during spawn: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from spawn-command template rendering.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// The template references a placeholder outside the closed key set.
    #[error("unknown placeholder {{{key}}}")]
    UnknownKey {
        /// The offending placeholder name.
        key: String,
    },

    /// A required placeholder has no configured value.
    #[error("unresolved placeholder {{{key}}}: no value configured")]
    Unresolved {
        /// The placeholder that could not be filled.
        key: String,
    },

    /// An opening brace was never closed.
    #[error("unterminated placeholder starting at byte {position}")]
    Unterminated {
        /// Byte offset of the opening brace.
        position: usize,
    },
}

/// Result type alias for netexpect operations.
pub type Result<T> = std::result::Result<T, NetError>;

impl NetError {
    /// Create an I/O error with context.
    pub fn io_context(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoWithContext {
            context: context.into(),
            source,
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a transcript error.
    pub fn transcript(message: impl Into<String>) -> Self {
        Self::Transcript {
            message: message.into(),
        }
    }

    /// Create a batch error.
    pub fn batch(message: impl Into<String>) -> Self {
        Self::Batch {
            message: message.into(),
        }
    }

    /// Create a sequence-mismatch error.
    pub fn sequence_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::SequenceMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Check if this is a login-phase failure (fatal for the session, not
    /// retried internally).
    #[must_use]
    pub const fn is_login_failure(&self) -> bool {
        matches!(
            self,
            Self::NoFirstPrompt { .. }
                | Self::BadOpen { .. }
                | Self::BadPassword
                | Self::NoEnablePrompt
                | Self::EnableFailed
        )
    }

    /// Check if this is a connect failure (retryable by the caller).
    #[must_use]
    pub const fn is_connect_failure(&self) -> bool {
        matches!(self, Self::ConnectFailed { .. })
    }

    /// Get the captured buffer contents if this error carries them.
    #[must_use]
    pub fn buffer(&self) -> Option<&str> {
        match self {
            Self::NoFirstPrompt { buffer, .. } => Some(buffer),
            _ => None,
        }
    }
}

impl SpawnError {
    /// Create a command not found error.
    pub fn command_not_found(command: impl Into<String>) -> Self {
        Self::CommandNotFound {
            command: command.into(),
        }
    }

    /// Create a PTY allocation error.
    pub fn pty_allocation(reason: impl Into<String>) -> Self {
        Self::PtyAllocation {
            reason: reason.into(),
        }
    }

    /// Create a terminal setup error.
    pub fn terminal_setup(reason: impl Into<String>) -> Self {
        Self::TerminalSetup {
            reason: reason.into(),
        }
    }
}
