//! Session lifecycle: connect with retries and teardown.
//!
//! Connecting walks the configured spawn-command templates, at most four per
//! try, for `retries + 1` tries. Individual attempt failures land in a
//! last-error slot so the loop can continue; only full exhaustion surfaces
//! as [`NetError::ConnectFailed`]. Teardown escalates: optional exit command,
//! graceful wait, kill signal, and a signal-0 probe to confirm death.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
#[cfg(unix)]
use tokio::time::timeout;
use tracing::debug;

use crate::error::{NetError, Result};
#[cfg(unix)]
use crate::error::SpawnError;
#[cfg(unix)]
use crate::config::SessionConfig;
#[cfg(unix)]
use crate::spawn::{SpawnedProcess, spawn_process};
#[cfg(unix)]
use crate::template::{TemplateVars, render, split_command};

use super::handle::Session;

/// Upper bound on spawn templates tried per connect round.
#[cfg(unix)]
const MAX_SPAWN_TEMPLATES: usize = 4;

/// Marker trait for session transports.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// A session over a type-erased transport, as produced by [`connect`].
pub type BoxedSession = Session<Box<dyn Transport>>;

/// Transport for replay sessions: reads never complete and writes are
/// discarded. Replay short-circuits command execution before any transport
/// I/O, so this only exists to satisfy the session's shape.
#[derive(Debug, Default)]
pub struct NullTransport;

impl AsyncRead for NullTransport {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Pending
    }
}

impl AsyncWrite for NullTransport {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Establish a session per the given configuration.
///
/// In replay mode no process is spawned; the returned session answers
/// commands from the transcript. Otherwise each template is rendered (an
/// unresolvable placeholder is a hard error), spawned, and logged in; the
/// first template whose spawn and login both succeed wins and is remembered
/// as the session's working command. In no-login mode (empty username and
/// password) the login machine is skipped and a bare connected session is
/// returned.
///
/// # Errors
///
/// Returns [`NetError::Template`] for an unrenderable template and
/// [`NetError::ConnectFailed`] when every template and retry is exhausted.
#[cfg(unix)]
pub async fn connect(mut config: SessionConfig) -> Result<BoxedSession> {
    if config.is_replay() {
        return Session::new(Box::new(NullTransport) as Box<dyn Transport>, config);
    }

    // Credentials left empty are collected up front: the username feeds the
    // spawn templates below.
    if !config.is_no_login() {
        config.resolve_credentials()?;
    }

    let templates: Vec<String> = config
        .spawn_templates
        .iter()
        .take(MAX_SPAWN_TEMPLATES)
        .cloned()
        .collect();
    if templates.is_empty() {
        return Err(NetError::Spawn(SpawnError::EmptyCommand));
    }

    let target_vars = template_vars(&config.address, config.port, &config.credentials.username);
    let mut rendered = Vec::with_capacity(templates.len());
    for template in &templates {
        rendered.push(render(template, &target_vars)?);
    }

    let mut last_error = String::from("no spawn attempts made");
    let mut attempts = 0usize;

    for _ in 0..=config.retries {
        for (template, target_cmd) in templates.iter().zip(&rendered) {
            attempts += 1;
            match attempt(&config, template, target_cmd).await {
                Ok(session) => return Ok(session),
                Err(e) => {
                    debug!(address = %config.address, error = %e, "connect attempt failed");
                    last_error = e.to_string();
                }
            }
        }
    }

    Err(NetError::ConnectFailed {
        attempts,
        last_error,
    })
}

/// One spawn-and-login attempt with a single template.
#[cfg(unix)]
async fn attempt(
    config: &SessionConfig,
    template: &str,
    target_cmd: &str,
) -> Result<BoxedSession> {
    let mut session = if let Some(bastion) = &config.bastion {
        // Hop: spawn and fully authenticate to the bastion, then transmit
        // the target spawn command as input through the open channel.
        let creds = bastion
            .credentials
            .clone()
            .unwrap_or_else(|| config.credentials.clone());
        let vars = template_vars(&bastion.address, bastion.port, &creds.username);
        let cmd = render(template, &vars)?;
        let spawned = spawn_process(&split_command(&cmd), config.dimensions)?;
        let mut session = from_spawned(spawned, config)?;

        if let Err(e) = session.login_with(&creds).await {
            let _ = session.close(None).await;
            return Err(e);
        }
        session.drain_pending();
        if let Err(e) = session.send_line(target_cmd).await {
            let _ = session.close(None).await;
            return Err(e);
        }
        session
    } else {
        let spawned = spawn_process(&split_command(target_cmd), config.dimensions)?;
        from_spawned(spawned, config)?
    };

    if !config.is_no_login() {
        let creds = config.credentials.clone();
        if let Err(e) = session.login_with(&creds).await {
            let _ = session.close(None).await;
            return Err(e);
        }
    }

    session.working_command = Some(target_cmd.to_string());
    Ok(session)
}

#[cfg(unix)]
fn from_spawned(spawned: SpawnedProcess, config: &SessionConfig) -> Result<BoxedSession> {
    let SpawnedProcess { stream, child } = spawned;
    let mut session = Session::new(Box::new(stream) as Box<dyn Transport>, config.clone())?;
    session.child = Some(child);
    Ok(session)
}

#[cfg(unix)]
fn template_vars(address: &str, port: u16, username: &str) -> TemplateVars {
    TemplateVars::new()
        .address(address)
        .username(username)
        .port(port.to_string())
}

impl<T> Session<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Close the session.
    ///
    /// Best-effort: an optional exit command is sent if the transport still
    /// accepts writes, the child is given the close timeout to exit
    /// gracefully, is killed if it survives, and its death is confirmed with
    /// a signal-0 probe. Safe to call repeatedly and on sessions whose
    /// connect failed.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature leaves room for transports
    /// whose shutdown can report problems.
    pub async fn close(&mut self, exit_command: Option<&str>) -> Result<()> {
        if !self.closed {
            if let Some(cmd) = exit_command {
                // The process may already be gone; that is fine.
                let _ = self.send_line(cmd).await;
            }
        }
        self.closed = true;

        #[cfg(unix)]
        self.reap_child().await;

        Ok(())
    }

    #[cfg(unix)]
    async fn reap_child(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        // Fast path: a child that already exited reaps without waiting out
        // the grace period.
        if let Ok(Some(_)) = child.try_wait() {
            return;
        }

        let grace = self.config.timeouts.close;

        if timeout(grace, child.wait()).await.is_err() && child.is_alive() {
            if let Err(e) = child.kill() {
                debug!(pid = child.pid(), error = %e, "kill failed; process likely already reaped");
            }
            let _ = timeout(grace, child.wait()).await;
        }

        if child.is_alive() {
            debug!(pid = child.pid(), "process survived teardown");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use crate::transcript::Recorder;
    use std::time::Duration;

    #[tokio::test]
    async fn replay_mode_never_spawns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replay.transcript");
        Recorder::open(&path)
            .unwrap()
            .append("show clock", "12:00:00 UTC")
            .unwrap();

        let config = SessionConfig::new("r1.test").replay_from(&path);
        let mut session = connect(config).await.unwrap();

        let reply = session.command("show clock").await.unwrap();
        assert_eq!(reply.output(), Some("12:00:00 UTC"));
    }

    #[tokio::test]
    async fn exhausted_templates_surface_last_error() {
        let mut config = SessionConfig::new("r1.test")
            .spawn_templates(["no-such-connect-program-xyz {address}"])
            .retries(1);
        config.credentials = Credentials::default();

        let err = connect(config).await.unwrap_err();
        match err {
            NetError::ConnectFailed {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 2);
                assert!(last_error.contains("command not found"), "{last_error}");
            }
            other => panic!("expected ConnectFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn credential_source_feeds_spawn_templates() {
        use crate::config::CredentialSource;
        use std::sync::Arc;

        #[derive(Debug)]
        struct Fixed;

        impl CredentialSource for Fixed {
            fn username(&self, _address: &str) -> std::io::Result<String> {
                Ok("opsuser".into())
            }

            fn password(&self, _address: &str) -> std::io::Result<String> {
                Ok("opspw".into())
            }
        }

        let config = SessionConfig::new("r1.test")
            .spawn_templates(["no-such-connect-program-xyz -l {username} {address}"])
            .credential_source(Arc::new(Fixed))
            .retries(0);

        // Rendering succeeds with the collected username; the failure is the
        // missing program, not an unresolved placeholder.
        let err = connect(config).await.unwrap_err();
        assert!(matches!(err, NetError::ConnectFailed { .. }));
    }

    #[tokio::test]
    async fn unresolved_placeholder_is_hard_error() {
        let config = SessionConfig::new("r1.test")
            .spawn_templates(["ssh -l {username} {address}"]);
        // No username configured: the placeholder cannot be filled.
        let err = connect(config).await.unwrap_err();
        assert!(matches!(err, NetError::Template(_)));
    }

    #[tokio::test]
    async fn no_login_returns_bare_session() {
        let mut config = SessionConfig::new("unused").spawn_templates(["cat"]);
        config.timeouts.close = Duration::from_millis(100);
        let mut session = connect(config).await.unwrap();

        assert!(session.prompt().is_none());
        assert!(session.working_command().is_some());
        session.close(None).await.unwrap();
    }

    #[tokio::test]
    async fn close_is_idempotent_and_confirms_death() {
        let mut config = SessionConfig::new("unused").spawn_templates(["cat"]);
        config.timeouts.close = Duration::from_millis(100);
        let mut session = connect(config).await.unwrap();

        session.close(Some("exit")).await.unwrap();
        assert!(session.is_closed());
        // Second close is a no-op.
        session.close(None).await.unwrap();
    }

    #[tokio::test]
    async fn close_after_child_exit_skips_grace_period() {
        let mut config = SessionConfig::new("unused").spawn_templates(["true"]);
        config.timeouts.close = Duration::from_secs(30);
        let mut session = connect(config).await.unwrap();

        // Give the child time to exit on its own.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let start = std::time::Instant::now();
        session.close(None).await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn close_on_never_connected_session_is_safe() {
        let config = SessionConfig::new("r1.test");
        let mut session =
            Session::new(Box::new(NullTransport) as Box<dyn Transport>, config).unwrap();
        session.close(None).await.unwrap();
        session.close(Some("quit")).await.unwrap();
    }
}
