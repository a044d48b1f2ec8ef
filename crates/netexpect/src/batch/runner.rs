//! Batch driver.
//!
//! One worker process per work-list line, each running its full
//! connect/command/close sequence independently and exiting. Workers share
//! no state; the driver's only jobs are launching within the throttle's
//! bound and reaping exits. Reaping is an explicit poll over pending wait
//! futures, not a signal handler.

use std::collections::VecDeque;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::Result;

use super::throttle::IdleCpuThrottle;
use super::worklist::WorkItem;

/// One failed worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    /// The work-list line the worker ran for.
    pub line: String,
    /// Why it failed (spawn error or exit status).
    pub reason: String,
}

/// Outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Workers that exited successfully.
    pub succeeded: usize,
    /// Workers that failed to spawn or exited nonzero.
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    /// Total workers accounted for.
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded + self.failed.len()
    }

    /// Whether every worker succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Runs one worker process per work item, bounded by an idle-CPU throttle.
#[derive(Debug)]
pub struct BatchRunner {
    program: String,
    throttle: IdleCpuThrottle,
}

impl BatchRunner {
    /// Create a runner that invokes `program` with each item's arguments.
    #[must_use]
    pub fn new(program: impl Into<String>, throttle: IdleCpuThrottle) -> Self {
        Self {
            program: program.into(),
            throttle,
        }
    }

    /// Run every work item to completion.
    ///
    /// A worker failure (spawn error or nonzero exit) is recorded in the
    /// report without aborting sibling workers.
    ///
    /// # Errors
    ///
    /// Never fails currently; per-worker problems land in the report.
    pub async fn run(&mut self, items: &[WorkItem]) -> Result<BatchReport> {
        let mut queue: VecDeque<WorkItem> = items.iter().cloned().collect();
        let mut running = FuturesUnordered::new();
        let mut report = BatchReport::default();

        loop {
            self.throttle.poll();

            while running.len() < self.throttle.limit() {
                let Some(item) = queue.pop_front() else { break };
                match Command::new(&self.program).args(item.args()).spawn() {
                    Ok(mut child) => {
                        debug!(line = %item.line, "worker started");
                        running.push(async move { (item, child.wait().await) });
                    }
                    Err(e) => report.failed.push(BatchFailure {
                        line: item.line,
                        reason: format!("spawn failed: {e}"),
                    }),
                }
            }

            if running.is_empty() && queue.is_empty() {
                break;
            }

            if let Some((item, result)) = running.next().await {
                match result {
                    Ok(status) if status.success() => report.succeeded += 1,
                    Ok(status) => report.failed.push(BatchFailure {
                        line: item.line,
                        reason: format!("worker exited with {status}"),
                    }),
                    Err(e) => report.failed.push(BatchFailure {
                        line: item.line,
                        reason: format!("wait failed: {e}"),
                    }),
                }
            }
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed.len(),
            "batch complete"
        );
        Ok(report)
    }
}
