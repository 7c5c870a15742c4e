//! Phase timing and the process-wide debug level
//!
//! The debug level only gates diagnostic output. It never changes what a
//! calculation computes.

use std::sync::atomic::{AtomicI32, Ordering};
use std::time::{Duration, Instant};

static DEBUG_LEVEL: AtomicI32 = AtomicI32::new(0);

/// Set the process-wide debug verbosity (0 disables diagnostics)
pub fn set_debug_level(level: i32) {
    DEBUG_LEVEL.store(level, Ordering::Relaxed);
}

/// Current process-wide debug verbosity
pub fn debug_level() -> i32 {
    DEBUG_LEVEL.load(Ordering::Relaxed)
}

/// Lap timer for the phases of one calculation cycle
#[derive(Debug, Clone)]
pub struct PhaseTimer {
    started: Instant,
    lap: Instant,
}

impl PhaseTimer {
    /// Start timing now
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            lap: now,
        }
    }

    /// Time since the previous lap, starting a new one
    pub fn snap(&mut self) -> Duration {
        let now = Instant::now();
        let interval = now - self.lap;
        self.lap = now;
        interval
    }

    /// Snap, and log `label` if debugging is enabled and the lap took longer
    /// than `threshold`. Returns the lap duration.
    pub fn maybe_snap(&mut self, label: &str, threshold: Duration) -> Duration {
        let interval = self.snap();
        if debug_level() > 0 && interval > threshold {
            tracing::debug!(
                "{} over threshold {:.6}s > {:.6}s",
                label,
                interval.as_secs_f64(),
                threshold.as_secs_f64()
            );
        }
        interval
    }

    /// Total time since the timer was started
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for PhaseTimer {
    fn default() -> Self {
        Self::start()
    }
}
