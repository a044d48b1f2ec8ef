//! Process spawning under a pseudo-terminal.
//!
//! Unix only: connection programs must see a controlling terminal or they
//! refuse to prompt interactively.

mod child;
mod pty;

pub use child::{ChildHandle, SpawnedProcess, spawn_process};
pub use pty::{PtyStream, open_slave};
