//! Core session handle.
//!
//! A [`Session`] owns one interactive connection: the async transport (a PTY
//! master for live connections, a scripted device in tests), the cleaned
//! output buffer every pattern match runs against, and the detected prompt
//! that anchors all output-boundary decisions.

use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::debug;

use crate::clean;
use crate::config::{CompiledPrompts, SessionConfig};
use crate::error::Result;
use crate::log::{escape_nonprintable, redact};
use crate::transcript::{Player, Recorder};

/// Outcome of one bounded read from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadOutcome {
    /// New data arrived and was appended to the pending buffer.
    Data,
    /// The wait elapsed with nothing received.
    Timeout,
    /// The transport reached end of stream.
    Eof,
}

/// One interactive device session over an async transport.
pub struct Session<T> {
    transport: T,
    pub(crate) config: SessionConfig,
    pub(crate) prompts: CompiledPrompts,
    secrets: Vec<String>,
    pub(crate) prompt: Option<String>,
    /// Cleaned output received but not yet consumed by a match.
    pub(crate) pending: String,
    pub(crate) recorder: Option<Recorder>,
    pub(crate) player: Option<Player>,
    /// The rendered spawn command that produced a working connection.
    pub(crate) working_command: Option<String>,
    pub(crate) closed: bool,
    #[cfg(unix)]
    pub(crate) child: Option<crate::spawn::ChildHandle>,
}

impl<T> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.config.address)
            .field("prompt", &self.prompt)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl<T> Session<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Create a session over an already-established transport.
    ///
    /// Compiles the configured prompt patterns and opens the transcript
    /// recorder or player if the configuration names one.
    ///
    /// # Errors
    ///
    /// Returns an error on an invalid prompt regex or an unusable transcript
    /// file.
    pub fn new(transport: T, config: SessionConfig) -> Result<Self> {
        let prompts = config.prompts.compile()?;
        let secrets = config.secrets();
        let recorder = match &config.record_path {
            Some(path) => Some(Recorder::open(path)?),
            None => None,
        };
        let player = match &config.replay_path {
            Some(path) => Some(Player::load(path)?),
            None => None,
        };

        Ok(Self {
            transport,
            config,
            prompts,
            secrets,
            prompt: None,
            pending: String::new(),
            recorder,
            player,
            working_command: None,
            closed: false,
            #[cfg(unix)]
            child: None,
        })
    }

    /// The detected command prompt, if prompt detection has run.
    #[must_use]
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    /// The spawn command that produced this connection, once connected.
    #[must_use]
    pub fn working_command(&self) -> Option<&str> {
        self.working_command.as_deref()
    }

    /// Whether the session has been closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Read once from the transport, waiting at most `wait`.
    ///
    /// Received bytes are cleaned and appended to the pending buffer.
    pub(crate) async fn read_more(&mut self, wait: Duration) -> Result<ReadOutcome> {
        let mut buf = BytesMut::with_capacity(4096);
        match timeout(wait, self.transport.read_buf(&mut buf)).await {
            Err(_elapsed) => Ok(ReadOutcome::Timeout),
            Ok(Ok(0)) => Ok(ReadOutcome::Eof),
            Ok(Ok(_)) => {
                let text = clean::clean(&buf);
                self.log_line("rx", &text);
                self.pending.push_str(&text);
                Ok(ReadOutcome::Data)
            }
            Ok(Err(e)) => Err(e.into()),
        }
    }

    /// Transmit text exactly as given.
    pub(crate) async fn send(&mut self, text: &str) -> Result<()> {
        self.log_line("tx", text);
        self.transport.write_all(text.as_bytes()).await?;
        self.transport.flush().await?;
        Ok(())
    }

    /// Transmit text followed by a carriage return.
    pub(crate) async fn send_line(&mut self, text: &str) -> Result<()> {
        self.log_line("tx", text);
        self.transport.write_all(text.as_bytes()).await?;
        self.transport.write_all(b"\r").await?;
        self.transport.flush().await?;
        Ok(())
    }

    /// Discard any buffered output.
    pub(crate) fn drain_pending(&mut self) {
        self.pending.clear();
    }

    /// Consume the first `n` bytes of the pending buffer.
    pub(crate) fn consume_pending(&mut self, n: usize) {
        self.pending.drain(..n);
    }

    /// Record a command/output pair if record mode is active.
    pub(crate) fn record(&mut self, command: &str, output: &str) -> Result<()> {
        if let Some(recorder) = &mut self.recorder {
            recorder.append(command, output)?;
        }
        Ok(())
    }

    fn log_line(&self, direction: &str, text: &str) {
        debug!(
            address = %self.config.address,
            data = %escape_nonprintable(&redact(text, &self.secrets)),
            "{direction}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use crate::mock::MockDevice;

    fn test_config() -> SessionConfig {
        SessionConfig::new("r1.test")
            .credentials(Credentials::new("admin", "pw"))
    }

    #[tokio::test]
    async fn read_more_cleans_and_buffers() {
        let device = MockDevice::new().banner(b"\xff\xfbhello\r\n".as_slice());
        let mut session = Session::new(device, test_config()).unwrap();

        let outcome = session.read_more(Duration::from_millis(200)).await.unwrap();
        assert_eq!(outcome, ReadOutcome::Data);
        assert_eq!(session.pending, "hello\n");
    }

    #[tokio::test]
    async fn read_more_times_out_quietly() {
        let device = MockDevice::new();
        let mut session = Session::new(device, test_config()).unwrap();

        let outcome = session.read_more(Duration::from_millis(50)).await.unwrap();
        assert_eq!(outcome, ReadOutcome::Timeout);
        assert!(session.pending.is_empty());
    }

    #[tokio::test]
    async fn read_more_reports_eof() {
        let device = MockDevice::new();
        device.signal_eof();
        let mut session = Session::new(device, test_config()).unwrap();

        let outcome = session.read_more(Duration::from_millis(200)).await.unwrap();
        assert_eq!(outcome, ReadOutcome::Eof);
    }

    #[tokio::test]
    async fn send_line_appends_carriage_return() {
        let device = MockDevice::new();
        let handle = device.clone();
        let mut session = Session::new(device, test_config()).unwrap();

        session.send_line("show version").await.unwrap();
        assert_eq!(handle.input_str(), "show version\r");
    }
}
