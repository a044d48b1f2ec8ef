//! Interactive device sessions.
//!
//! The submodules split the engine along its phases: the core handle and
//! buffer management, prompt detection, login negotiation, command
//! execution, and lifecycle (connect/close).

mod command;
mod handle;
mod lifecycle;
mod login;
mod prompt;

pub use command::CommandReply;
pub use handle::Session;
#[cfg(unix)]
pub use lifecycle::connect;
pub use lifecycle::{BoxedSession, NullTransport, Transport};
