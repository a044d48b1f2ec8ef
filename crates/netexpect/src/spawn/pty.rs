//! PTY allocation and async I/O.
//!
//! Spawned ssh/telnet clients only behave interactively (password prompts,
//! pagination) when their stdio is a terminal, so every connection runs the
//! client under a pseudo-terminal. This module owns the master side.

use std::io;
use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};
use std::pin::Pin;
use std::task::{Context, Poll};

use rustix::fs::{OFlags, fcntl_setfl};
use rustix::pty::{OpenptFlags, grantpt, openpt, ptsname, unlockpt};
use rustix::termios::{Winsize, tcsetwinsize};
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::error::SpawnError;

fn errno_to_io(e: rustix::io::Errno) -> io::Error {
    io::Error::from_raw_os_error(e.raw_os_error())
}

/// The master side of a pseudo-terminal, readable and writable as an async
/// stream.
pub struct PtyStream {
    async_fd: AsyncFd<OwnedFd>,
}

impl std::fmt::Debug for PtyStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyStream")
            .field("fd", &self.async_fd.as_raw_fd())
            .finish()
    }
}

impl PtyStream {
    /// Allocate a new pseudo-terminal pair.
    ///
    /// Returns the master stream and the slave device path to hand to the
    /// child process.
    ///
    /// # Errors
    ///
    /// Returns [`SpawnError::PtyAllocation`] if any allocation step fails.
    pub fn open() -> Result<(Self, String), SpawnError> {
        let master_fd = openpt(OpenptFlags::RDWR | OpenptFlags::NOCTTY)
            .map_err(|e| SpawnError::pty_allocation(format!("openpt: {}", errno_to_io(e))))?;

        grantpt(&master_fd)
            .map_err(|e| SpawnError::pty_allocation(format!("grantpt: {}", errno_to_io(e))))?;
        unlockpt(&master_fd)
            .map_err(|e| SpawnError::pty_allocation(format!("unlockpt: {}", errno_to_io(e))))?;

        let slave_name = ptsname(&master_fd, Vec::new())
            .map_err(|e| SpawnError::pty_allocation(format!("ptsname: {}", errno_to_io(e))))?;
        let slave_path = slave_name
            .to_str()
            .map_err(|_| SpawnError::pty_allocation("invalid slave path encoding"))?
            .to_string();

        fcntl_setfl(&master_fd, OFlags::NONBLOCK)
            .map_err(|e| SpawnError::pty_allocation(format!("set nonblocking: {}", errno_to_io(e))))?;

        let async_fd = AsyncFd::new(master_fd).map_err(SpawnError::Io)?;

        Ok((Self { async_fd }, slave_path))
    }

    /// Set the terminal dimensions the child process will observe.
    ///
    /// # Errors
    ///
    /// Returns [`SpawnError::TerminalSetup`] if the ioctl fails.
    pub fn set_dimensions(&self, cols: u16, rows: u16) -> Result<(), SpawnError> {
        let winsize = Winsize {
            ws_col: cols,
            ws_row: rows,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        tcsetwinsize(self.async_fd.get_ref(), winsize)
            .map_err(|e| SpawnError::terminal_setup(format!("set window size: {}", errno_to_io(e))))
    }
}

impl AsRawFd for PtyStream {
    fn as_raw_fd(&self) -> RawFd {
        self.async_fd.as_raw_fd()
    }
}

impl AsyncRead for PtyStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            let mut guard = match self.async_fd.poll_read_ready(cx) {
                Poll::Ready(Ok(guard)) => guard,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            };

            let unfilled = buf.initialize_unfilled();
            match rustix::io::read(self.async_fd.get_ref(), unfilled) {
                Ok(0) => return Poll::Ready(Ok(())),
                Ok(n) => {
                    buf.advance(n);
                    return Poll::Ready(Ok(()));
                }
                Err(rustix::io::Errno::AGAIN) => {
                    guard.clear_ready();
                }
                // Linux reports EIO on the master once the slave side has
                // been closed by the exiting child; treat it as EOF.
                Err(rustix::io::Errno::IO) => return Poll::Ready(Ok(())),
                Err(e) => return Poll::Ready(Err(errno_to_io(e))),
            }
        }
    }
}

impl AsyncWrite for PtyStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        loop {
            let mut guard = match self.async_fd.poll_write_ready(cx) {
                Poll::Ready(Ok(guard)) => guard,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            };

            match rustix::io::write(self.async_fd.get_ref(), buf) {
                Ok(n) => return Poll::Ready(Ok(n)),
                Err(rustix::io::Errno::AGAIN) => {
                    guard.clear_ready();
                }
                Err(e) => return Poll::Ready(Err(errno_to_io(e))),
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Open the slave side of an allocated pseudo-terminal.
pub fn open_slave(path: &str) -> Result<OwnedFd, SpawnError> {
    use rustix::fs::{Mode, open};
    use std::path::Path;

    open(Path::new(path), OFlags::RDWR | OFlags::NOCTTY, Mode::empty())
        .map_err(|e| SpawnError::pty_allocation(format!("open slave {path}: {}", errno_to_io(e))))
}
