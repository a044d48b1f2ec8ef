//! Batch execution: work lists, adaptive throttling, and the worker driver.

mod runner;
mod throttle;
mod worklist;

pub use runner::{BatchFailure, BatchReport, BatchRunner};
pub use throttle::{CpuSample, IdleCpuThrottle, MIN_SAMPLE_INTERVAL};
pub use worklist::{WorkItem, load, parse};
