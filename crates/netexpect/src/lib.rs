//! Expect-style automation of network device command-line sessions.
//!
//! netexpect drives interactive CLI sessions with routers and switches over
//! spawned ssh/telnet subprocesses running under pseudo-terminals: prompt
//! detection, login negotiation, command execution with pagination handling,
//! transcript record/replay for deterministic tests, and a batch driver with
//! an idle-CPU concurrency throttle.
//!
//! # Example
//!
//! ```no_run
//! use netexpect::{Credentials, SessionConfig, connect};
//!
//! # async fn run() -> netexpect::Result<()> {
//! let config = SessionConfig::new("router1.example.net")
//!     .credentials(Credentials::new("admin", "secret"));
//! let mut session = connect(config).await?;
//!
//! let reply = session.command("show version").await?;
//! if let Some(output) = reply.output() {
//!     println!("{output}");
//! }
//! session.close(Some("exit")).await?;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod clean;
pub mod config;
pub mod error;
pub mod log;
pub mod mock;
pub mod pattern;
pub mod session;
#[cfg(unix)]
pub mod spawn;
pub mod stanza;
pub mod template;
pub mod transcript;

#[cfg(unix)]
pub use config::TtyPrompt;
pub use config::{
    BastionConfig, CredentialSource, Credentials, PromptPatterns, SessionConfig, TimeoutConfig,
};
pub use error::{NetError, Result, SpawnError, TemplateError};
pub use pattern::{AnswerAction, AnswerTable, Pattern};
#[cfg(unix)]
pub use session::connect;
pub use session::{BoxedSession, CommandReply, NullTransport, Session, Transport};
pub use transcript::{Player, Recorder};
