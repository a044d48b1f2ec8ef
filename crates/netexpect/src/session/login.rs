//! Login negotiation.
//!
//! Drives a freshly spawned connection through username/password/enable
//! negotiation. The phases are explicit: waiting for a first prompt, username
//! sent, password sent. Failures are distinguishable values, not one generic
//! login error, because callers retry connection failures but never
//! authentication failures.

use std::time::Instant;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::config::Credentials;
use crate::error::{NetError, Result};
use crate::pattern::{PatternMatch, PatternSet};

use super::handle::{ReadOutcome, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitingFirst,
    SentUsername,
    SentPassword,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Matched {
    BadOpen,
    BadPassword,
    Username,
    Password,
    Prompt,
}

/// The full line of `text` containing byte position `pos`.
fn line_containing(text: &str, pos: usize) -> &str {
    let start = text[..pos].rfind('\n').map_or(0, |i| i + 1);
    let end = text[pos..].find('\n').map_or(text.len(), |i| pos + i);
    text[start..end].trim_end()
}

impl<T> Session<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Authenticate with the session's configured credentials.
    ///
    /// On success the input buffer is cleared and the prompt redetected, so
    /// the session is ready for commands.
    ///
    /// # Errors
    ///
    /// Returns one of the login failure values: [`NetError::NoFirstPrompt`],
    /// [`NetError::BadOpen`], [`NetError::BadPassword`],
    /// [`NetError::NoEnablePrompt`], or [`NetError::EnableFailed`].
    pub async fn login(&mut self) -> Result<()> {
        let creds = self.config.credentials.clone();
        self.login_with(&creds).await
    }

    /// Authenticate with explicit credentials (used for the bastion hop,
    /// which may carry its own credential set).
    pub(crate) async fn login_with(&mut self, creds: &Credentials) -> Result<()> {
        if creds.is_empty() {
            return Ok(());
        }

        self.negotiate(creds).await?;

        if let Some(secret) = creds.enable_password.clone() {
            self.enable(&secret).await?;
        }

        self.drain_pending();
        self.detect_prompt().await?;
        Ok(())
    }

    /// Run the username/password exchange until a command prompt appears.
    async fn negotiate(&mut self, creds: &Credentials) -> Result<()> {
        let login_timeout = self.config.timeouts.login;
        let mut deadline = Instant::now() + login_timeout;
        let mut phase = Phase::AwaitingFirst;
        let mut username_reprompted = false;
        let mut probed = false;
        // Everything received so far, kept for failure diagnostics.
        let mut seen = String::new();

        loop {
            while let Some((kind, m)) = self.login_match(phase) {
                match kind {
                    Matched::BadOpen => {
                        let banner = line_containing(&self.pending, m.start).to_string();
                        return Err(NetError::BadOpen { banner });
                    }
                    Matched::BadPassword => return Err(NetError::BadPassword),
                    Matched::Username => match phase {
                        Phase::AwaitingFirst => {
                            self.send_line(&creds.username).await?;
                            phase = Phase::SentUsername;
                        }
                        Phase::SentUsername if !username_reprompted => {
                            // A repeated username prompt is tolerated once as
                            // an echo artifact.
                            username_reprompted = true;
                            self.send_line(&creds.username).await?;
                        }
                        _ => return Err(NetError::BadPassword),
                    },
                    Matched::Password => {
                        if phase == Phase::SentPassword {
                            return Err(NetError::BadPassword);
                        }
                        self.send_line(&creds.password).await?;
                        phase = Phase::SentPassword;
                    }
                    Matched::Prompt => {
                        debug!(address = %self.config.address, "authenticated");
                        seen.push_str(&self.pending);
                        self.drain_pending();
                        return Ok(());
                    }
                }
                seen.push_str(&self.pending[..m.end]);
                self.consume_pending(m.end);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            let outcome = if remaining.is_zero() {
                ReadOutcome::Timeout
            } else {
                self.read_more(remaining).await?
            };

            match outcome {
                ReadOutcome::Data => {}
                ReadOutcome::Timeout => {
                    if probed {
                        seen.push_str(&self.pending);
                        return Err(NetError::NoFirstPrompt {
                            timeout: login_timeout,
                            buffer: seen,
                        });
                    }
                    // One bare carriage return sometimes shakes a prompt
                    // loose from a device that swallowed the first banner.
                    probed = true;
                    self.send("\r").await?;
                    deadline = Instant::now() + login_timeout;
                }
                ReadOutcome::Eof => {
                    seen.push_str(&self.pending);
                    if phase == Phase::SentPassword {
                        return Err(NetError::BadPassword);
                    }
                    let banner = seen
                        .lines()
                        .rev()
                        .find(|l| !l.trim().is_empty())
                        .unwrap_or("connection closed")
                        .to_string();
                    return Err(NetError::BadOpen { banner });
                }
            }
        }
    }

    /// Negotiate privileged mode.
    async fn enable(&mut self, secret: &str) -> Result<()> {
        self.drain_pending();
        self.send_line("enable").await?;

        // Wait for the password sub-prompt.
        let deadline = Instant::now() + self.config.timeouts.login;
        loop {
            if let Some(m) = self.prompts.password_prompt.matches(&self.pending) {
                self.consume_pending(m.end);
                break;
            }
            if !self.read_until(deadline).await? {
                return Err(NetError::NoEnablePrompt);
            }
        }

        self.send_line(secret).await?;

        // Verify acceptance: the next thing must be a command prompt.
        let deadline = Instant::now() + self.config.timeouts.login;
        loop {
            if self.prompts.bad_password.matches(&self.pending).is_some()
                || self.prompts.password_prompt.matches(&self.pending).is_some()
            {
                return Err(NetError::EnableFailed);
            }
            if self.prompts.prompt_shape.matches(&self.pending).is_some() {
                self.drain_pending();
                return Ok(());
            }
            if !self.read_until(deadline).await? {
                return Err(NetError::EnableFailed);
            }
        }
    }

    /// Read once, bounded by `deadline`. Returns false when no more data can
    /// be expected (timeout or EOF).
    async fn read_until(&mut self, deadline: Instant) -> Result<bool> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(false);
        }
        Ok(matches!(self.read_more(remaining).await?, ReadOutcome::Data))
    }

    /// Find the earliest-positioned login pattern in the pending buffer.
    /// Ties go to the more specific pattern (listed first). The bad-password
    /// pattern only joins the set once a password has been sent; devices
    /// routinely mention past authentication failures in login banners.
    fn login_match(&self, phase: Phase) -> Option<(Matched, PatternMatch)> {
        let mut kinds = vec![Matched::BadOpen];
        let mut patterns = vec![self.prompts.bad_open.clone()];
        if phase == Phase::SentPassword {
            kinds.push(Matched::BadPassword);
            patterns.push(self.prompts.bad_password.clone());
        }
        kinds.extend([Matched::Username, Matched::Password, Matched::Prompt]);
        patterns.extend([
            self.prompts.username_prompt.clone(),
            self.prompts.password_prompt.clone(),
            self.prompts.prompt_shape.clone(),
        ]);

        let (idx, m) = PatternSet::from_patterns(patterns).find_match(&self.pending)?;
        Some((kinds[idx], m))
    }
}
