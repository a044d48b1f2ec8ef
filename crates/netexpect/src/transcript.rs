//! Transcript record and replay.
//!
//! Every command/output pair can be appended to a flat-text transcript file
//! and later replayed for deterministic testing without a live device.

mod format;
mod player;
mod recorder;

pub use format::{DELIMITER, escape, render_entry, unescape};
pub use player::Player;
pub use recorder::Recorder;
