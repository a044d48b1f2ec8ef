//! Child process spawning and lifecycle.
//!
//! Connection programs (ssh, telnet) run as child processes with their stdio
//! bound to the slave side of a PTY and the PTY as their controlling
//! terminal. The handle here supports the teardown ladder: graceful exit,
//! kill signal, then a signal-0 probe to confirm the process is gone.

use std::io;
use std::os::unix::io::{AsRawFd, FromRawFd};
use std::process::{ExitStatus, Stdio};

use rustix::process::{Pid, Signal, kill_process, test_kill_process};
use tokio::process::{Child, Command};

use crate::error::SpawnError;

use super::pty::{PtyStream, open_slave};

/// Handle to a spawned connection process.
#[derive(Debug)]
pub struct ChildHandle {
    child: Child,
    pid: u32,
}

impl ChildHandle {
    /// The child's process ID.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Collect the exit status without blocking.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait syscall fails.
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>, SpawnError> {
        self.child.try_wait().map_err(SpawnError::Io)
    }

    /// Wait for the child to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait syscall fails.
    pub async fn wait(&mut self) -> Result<ExitStatus, SpawnError> {
        self.child.wait().await.map_err(SpawnError::Io)
    }

    /// Send a signal to the child.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill syscall fails.
    pub fn signal(&self, signal: Signal) -> Result<(), SpawnError> {
        let pid = pid_of(self.pid)?;
        kill_process(pid, signal)
            .map_err(|e| SpawnError::Io(io::Error::from_raw_os_error(e.raw_os_error())))
    }

    /// Send SIGKILL.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill syscall fails.
    pub fn kill(&self) -> Result<(), SpawnError> {
        self.signal(Signal::KILL)
    }

    /// Probe with signal 0 whether the process still exists.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        let Ok(pid) = pid_of(self.pid) else {
            return false;
        };
        test_kill_process(pid).is_ok()
    }
}

fn pid_of(raw: u32) -> Result<Pid, SpawnError> {
    let signed = i32::try_from(raw)
        .map_err(|_| SpawnError::Io(io::Error::new(io::ErrorKind::InvalidInput, "pid overflow")))?;
    Pid::from_raw(signed)
        .ok_or_else(|| SpawnError::Io(io::Error::new(io::ErrorKind::InvalidInput, "invalid pid")))
}

/// A spawned connection process with its PTY master stream.
#[derive(Debug)]
pub struct SpawnedProcess {
    /// The PTY master, carrying the interactive dialog.
    pub stream: PtyStream,
    /// Lifecycle handle for the child.
    pub child: ChildHandle,
}

/// Spawn an argv under a freshly allocated PTY.
///
/// The child gets the slave side as stdin/stdout/stderr and as its
/// controlling terminal in a new session.
///
/// # Errors
///
/// Returns [`SpawnError::EmptyCommand`] for an empty argv,
/// [`SpawnError::CommandNotFound`] if the program does not exist, and
/// allocation or I/O errors otherwise.
pub fn spawn_process(argv: &[String], dimensions: (u16, u16)) -> Result<SpawnedProcess, SpawnError> {
    let Some((program, args)) = argv.split_first() else {
        return Err(SpawnError::EmptyCommand);
    };

    let (stream, slave_path) = PtyStream::open()?;
    stream.set_dimensions(dimensions.0, dimensions.1)?;

    let slave_fd = open_slave(&slave_path)?;
    let slave_raw = slave_fd.as_raw_fd();

    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.env("TERM", "vt100");

    // SAFETY: slave_raw is a valid fd owned by slave_fd, which outlives the
    // spawn call.
    unsafe {
        cmd.stdin(Stdio::from_raw_fd(libc::dup(slave_raw)));
        cmd.stdout(Stdio::from_raw_fd(libc::dup(slave_raw)));
        cmd.stderr(Stdio::from_raw_fd(libc::dup(slave_raw)));
    }

    // SAFETY: setsid and ioctl are async-signal-safe.
    unsafe {
        cmd.pre_exec(move || {
            if libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }
            if libc::ioctl(slave_raw, libc::TIOCSCTTY, 0) == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let child = cmd.spawn().map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            SpawnError::command_not_found(program.clone())
        } else {
            SpawnError::Io(e)
        }
    })?;

    let pid = child
        .id()
        .ok_or_else(|| SpawnError::Io(io::Error::other("spawned child has no pid")))?;

    Ok(SpawnedProcess {
        stream,
        child: ChildHandle { child, pid },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_argv_is_rejected() {
        let err = spawn_process(&[], (80, 24)).unwrap_err();
        assert!(matches!(err, SpawnError::EmptyCommand));
    }

    #[tokio::test]
    async fn missing_program_is_not_found() {
        let argv = vec!["definitely-not-a-real-program-xyz".to_string()];
        let err = spawn_process(&argv, (80, 24)).unwrap_err();
        assert!(matches!(err, SpawnError::CommandNotFound { .. }));
    }

    #[tokio::test]
    async fn spawned_child_runs_and_exits() {
        let argv: Vec<String> = ["sh", "-c", "exit 0"].iter().map(ToString::to_string).collect();
        let mut spawned = spawn_process(&argv, (80, 24)).unwrap();
        let status = spawned.child.wait().await.unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn try_wait_is_none_while_running() {
        let argv: Vec<String> = ["sh", "-c", "sleep 30"].iter().map(ToString::to_string).collect();
        let mut spawned = spawn_process(&argv, (80, 24)).unwrap();
        assert!(spawned.child.try_wait().unwrap().is_none());

        spawned.child.kill().unwrap();
        let _ = spawned.child.wait().await.unwrap();
    }

    #[tokio::test]
    async fn kill_then_probe() {
        let argv: Vec<String> = ["sh", "-c", "sleep 30"].iter().map(ToString::to_string).collect();
        let mut spawned = spawn_process(&argv, (80, 24)).unwrap();
        assert!(spawned.child.is_alive());

        spawned.child.kill().unwrap();
        let _ = spawned.child.wait().await.unwrap();
        assert!(!spawned.child.is_alive());
    }
}
