//! Scripted fake device for testing.
//!
//! [`MockDevice`] implements `AsyncRead`/`AsyncWrite` over shared state so an
//! engine under test can drive a full login-and-command dialog without
//! spawning a real process. The device is rule based: each line of input it
//! receives (terminated by CR or LF) is matched against scripted rules in
//! insertion order, and the first matching rule's response is queued as
//! output.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

#[derive(Debug)]
struct Rule {
    trigger: String,
    response: Vec<u8>,
    once: bool,
    used: bool,
    close_after: bool,
}

/// Shared state for the mock device.
#[derive(Debug)]
struct MockState {
    /// Data to be read by the engine.
    output: VecDeque<u8>,
    /// Everything the engine has written.
    input: Vec<u8>,
    /// Bytes of the current not-yet-terminated input line.
    partial_line: Vec<u8>,
    /// Scripted responses.
    rules: Vec<Rule>,
    /// Whether EOF has been signaled.
    eof: bool,
    /// Waker for a reader parked on an empty output buffer.
    waker: Option<Waker>,
}

impl MockState {
    fn wake(&mut self) {
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }

    fn feed_input(&mut self, buf: &[u8]) {
        self.input.extend_from_slice(buf);
        for &byte in buf {
            if byte == b'\r' || byte == b'\n' {
                let line = String::from_utf8_lossy(&self.partial_line).into_owned();
                self.partial_line.clear();
                self.dispatch(&line);
            } else {
                self.partial_line.push(byte);
            }
        }
    }

    fn dispatch(&mut self, line: &str) {
        for rule in &mut self.rules {
            if rule.used || rule.trigger != line {
                continue;
            }
            if rule.once {
                rule.used = true;
            }
            let response = rule.response.clone();
            let close_after = rule.close_after;
            self.output.extend(response);
            if close_after {
                self.eof = true;
            }
            self.wake();
            return;
        }
    }
}

/// A scripted fake device.
///
/// Cloning shares the underlying state, so a test can keep one handle for
/// inspection while the engine owns another as its transport.
#[derive(Debug, Clone)]
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    /// Create a device with no banner and no rules.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                output: VecDeque::new(),
                input: Vec::new(),
                partial_line: Vec::new(),
                rules: Vec::new(),
                eof: false,
                waker: None,
            })),
        }
    }

    /// Queue banner text emitted before any input arrives.
    #[must_use]
    pub fn banner(self, text: impl AsRef<[u8]>) -> Self {
        {
            let mut state = self.lock();
            state.output.extend(text.as_ref());
        }
        self
    }

    /// Add a repeating rule: whenever an input line equals `trigger`, queue
    /// `response` as output. The empty trigger matches bare CR probes.
    #[must_use]
    pub fn on(self, trigger: impl Into<String>, response: impl AsRef<[u8]>) -> Self {
        self.add_rule(trigger.into(), response.as_ref().to_vec(), false, false)
    }

    /// Add a one-shot rule consumed by its first match.
    #[must_use]
    pub fn on_once(self, trigger: impl Into<String>, response: impl AsRef<[u8]>) -> Self {
        self.add_rule(trigger.into(), response.as_ref().to_vec(), true, false)
    }

    /// Add a rule that queues `response` and then signals EOF, as a device
    /// closing the connection after an exit command would.
    #[must_use]
    pub fn close_on(self, trigger: impl Into<String>, response: impl AsRef<[u8]>) -> Self {
        self.add_rule(trigger.into(), response.as_ref().to_vec(), false, true)
    }

    fn add_rule(self, trigger: String, response: Vec<u8>, once: bool, close_after: bool) -> Self {
        {
            let mut state = self.lock();
            state.rules.push(Rule {
                trigger,
                response,
                once,
                used: false,
                close_after,
            });
        }
        self
    }

    /// Queue output directly, outside any rule.
    pub fn queue_output(&self, data: &[u8]) {
        let mut state = self.lock();
        state.output.extend(data);
        state.wake();
    }

    /// Signal EOF after the queued output drains.
    pub fn signal_eof(&self) {
        let mut state = self.lock();
        state.eof = true;
        state.wake();
    }

    /// Everything the engine has written so far, as text.
    #[must_use]
    pub fn input_str(&self) -> String {
        let state = self.lock();
        String::from_utf8_lossy(&state.input).into_owned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncRead for MockDevice {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut state = self.lock();

        if state.output.is_empty() {
            if state.eof {
                return Poll::Ready(Ok(()));
            }
            state.waker = Some(cx.waker().clone());
            return Poll::Pending;
        }

        let to_read = buf.remaining().min(state.output.len());
        for _ in 0..to_read {
            if let Some(byte) = state.output.pop_front() {
                buf.put_slice(&[byte]);
            }
        }
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockDevice {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut state = self.lock();
        state.feed_input(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut state = self.lock();
        state.eof = true;
        state.wake();
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn banner_is_readable() {
        let mut device = MockDevice::new().banner("Welcome\nrouter1#");
        let mut buf = [0u8; 64];
        let n = device.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"Welcome\nrouter1#");
    }

    #[tokio::test]
    async fn rule_fires_on_matching_line() {
        let mut device = MockDevice::new().on("show clock", "12:00:00 UTC\nrouter1#");
        device.write_all(b"show clock\r").await.unwrap();

        let mut buf = [0u8; 64];
        let n = device.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"12:00:00 UTC\nrouter1#");
    }

    #[tokio::test]
    async fn empty_trigger_matches_bare_cr() {
        let mut device = MockDevice::new().on("", "\nrouter1#");
        device.write_all(b"\r").await.unwrap();

        let mut buf = [0u8; 64];
        let n = device.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"\nrouter1#");
    }

    #[tokio::test]
    async fn once_rule_is_consumed() {
        let device = MockDevice::new()
            .on_once("probe", "first")
            .on("probe", "rest");
        let mut handle = device.clone();

        handle.write_all(b"probe\r").await.unwrap();
        handle.write_all(b"probe\r").await.unwrap();

        let mut buf = [0u8; 64];
        let n = handle.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"firstrest");
    }

    #[tokio::test]
    async fn close_rule_signals_eof() {
        let mut device = MockDevice::new().close_on("exit", "bye\n");
        device.write_all(b"exit\r").await.unwrap();

        let mut buf = [0u8; 64];
        let n = device.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"bye\n");
        let n = device.read(&mut buf).await.unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn input_is_captured() {
        let mut device = MockDevice::new();
        device.write_all(b"enable\r").await.unwrap();
        assert_eq!(device.input_str(), "enable\r");
    }
}
