//! Adaptive concurrency throttle.
//!
//! The batch driver bounds concurrent workers by measured spare CPU: idle
//! percentage above the target raises the allowed worker count by one, below
//! it lowers by one, clamped to a floor of one and a ceiling proportional to
//! the core count. Samples come from `/proc/stat` no more often than every
//! few seconds; the adjustment itself is pure so it can be tested without a
//! clock or a kernel.

use std::time::{Duration, Instant};

use tracing::debug;

/// Minimum time between CPU samples.
pub const MIN_SAMPLE_INTERVAL: Duration = Duration::from_secs(5);

/// Idle-CPU percentage the controller steers toward.
const TARGET_IDLE_PERCENT: f64 = 20.0;

/// Ceiling multiplier per core.
const CEILING_PER_CORE: usize = 2;

/// One reading of the aggregate `cpu` counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuSample {
    /// Jiffies spent idle (idle + iowait).
    pub idle: u64,
    /// Total jiffies across all states.
    pub total: u64,
}

impl CpuSample {
    /// Parse the first `cpu` line of `/proc/stat` text.
    #[must_use]
    pub fn parse(stat_text: &str) -> Option<Self> {
        let line = stat_text.lines().find(|l| l.starts_with("cpu "))?;
        let fields: Vec<u64> = line
            .split_whitespace()
            .skip(1)
            .filter_map(|f| f.parse().ok())
            .collect();
        if fields.len() < 4 {
            return None;
        }

        // Fields: user nice system idle [iowait irq softirq steal ...]
        let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
        let total = fields.iter().sum();
        Some(Self { idle, total })
    }

    /// Idle percentage over the interval since an earlier sample.
    #[must_use]
    pub fn idle_percent_since(self, earlier: Self) -> Option<f64> {
        let total = self.total.checked_sub(earlier.total)?;
        let idle = self.idle.checked_sub(earlier.idle)?;
        if total == 0 {
            return None;
        }
        Some(idle as f64 / total as f64 * 100.0)
    }
}

/// Additive-increase/decrease controller over the concurrent worker bound.
#[derive(Debug)]
pub struct IdleCpuThrottle {
    limit: usize,
    ceiling: usize,
    target_idle: f64,
    last: Option<(Instant, CpuSample)>,
}

impl IdleCpuThrottle {
    /// Create a throttle starting at `initial` concurrent workers.
    #[must_use]
    pub fn new(initial: usize) -> Self {
        let cores = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        let ceiling = cores * CEILING_PER_CORE;
        Self {
            limit: initial.clamp(1, ceiling),
            ceiling,
            target_idle: TARGET_IDLE_PERCENT,
            last: None,
        }
    }

    /// The current concurrent-worker bound.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Apply one measured idle percentage: additive step toward the target,
    /// clamped to `[1, ceiling]`.
    pub fn adjust(&mut self, idle_percent: f64) {
        if idle_percent > self.target_idle {
            self.limit = (self.limit + 1).min(self.ceiling);
        } else if idle_percent < self.target_idle {
            self.limit = self.limit.saturating_sub(1).max(1);
        }
    }

    /// Sample the system if the minimum interval has elapsed and adjust the
    /// bound. Read failures are logged and skipped; the throttle keeps its
    /// current bound.
    pub fn poll(&mut self) {
        let now = Instant::now();
        if let Some((at, _)) = self.last {
            if now.duration_since(at) < MIN_SAMPLE_INTERVAL {
                return;
            }
        }

        let text = match std::fs::read_to_string("/proc/stat") {
            Ok(text) => text,
            Err(e) => {
                debug!(error = %e, "cpu sample unavailable");
                return;
            }
        };
        let Some(sample) = CpuSample::parse(&text) else {
            debug!("cpu sample unparsable");
            return;
        };

        if let Some((_, earlier)) = self.last {
            if let Some(idle) = sample.idle_percent_since(earlier) {
                self.adjust(idle);
                debug!(idle_percent = idle, limit = self.limit, "throttle adjusted");
            }
        }
        self.last = Some((now, sample));
    }
}
