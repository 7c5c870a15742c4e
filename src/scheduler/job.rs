//! Schedulable unit of work bound to one calculation target
//!
//! Each [`Job`] carries its own scheduling state so that a target is never
//! queued twice and never runs on two workers at once:
//!
//! ```text
//!            queue()                 worker picks up
//!   Idle ─────────────► Queued ─────────────────────► Running
//!    ▲                                                  │   │
//!    │                   done                           │   │ queue()
//!    └──────────────────────────────────────────────────┘   ▼
//!                     done (re-sent once)          RunningRequeued
//!              Queued ◄──────────────────────────────────────┘
//! ```
//!
//! Triggers arriving while `Queued` or `RunningRequeued` are coalesced.

use crate::analysis::timing::debug_level;
use crate::error::{Result, SpectraError};
use crate::scheduler::PoolMessage;
use crossbeam_channel::Sender;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};

/// Work executed by a [`Job`] on a pool worker
pub trait Calculation: Send + Sync {
    /// Run one calculation cycle
    fn calculate(&self);

    /// Called on the worker after `calculate` panicked
    fn calculation_panicked(&self) {}
}

/// Scheduling state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JobState {
    /// Not queued, not running
    Idle = 0,
    /// Waiting in the pool queue
    Queued = 1,
    /// Executing on a worker
    Running = 2,
    /// Executing, with one more run requested
    RunningRequeued = 3,
}

impl From<u8> for JobState {
    fn from(raw: u8) -> Self {
        match raw {
            0 => JobState::Idle,
            1 => JobState::Queued,
            2 => JobState::Running,
            _ => JobState::RunningRequeued,
        }
    }
}

/// What a call to [`Job::queue`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOutcome {
    /// The job was idle and has been sent to the pool
    Queued,
    /// The job was running; it will run once more when done
    Rerun,
    /// A run was already pending; nothing changed
    Coalesced,
}

/// A schedulable unit of work
pub struct Job {
    name: String,
    state: AtomicU8,
    target: Weak<dyn Calculation>,
    queue: Sender<PoolMessage>,
    pool_closed: Arc<AtomicBool>,
    runs: AtomicU64,
    coalesced: AtomicU64,
}

impl Job {
    pub(crate) fn new(
        name: impl Into<String>,
        target: Weak<dyn Calculation>,
        queue: Sender<PoolMessage>,
        pool_closed: Arc<AtomicBool>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: AtomicU8::new(JobState::Idle as u8),
            target,
            queue,
            pool_closed,
            runs: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> JobState {
        JobState::from(self.state.load(Ordering::Acquire))
    }

    /// Number of completed executions (including panicked ones)
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Acquire)
    }

    /// Number of queue requests absorbed by an already pending run
    pub fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }

    /// Request a run. Never blocks.
    pub fn queue(self: &Arc<Self>) -> Result<QueueOutcome> {
        let mut current = self.state.load(Ordering::Acquire);
        let outcome = loop {
            let (next, outcome) = match JobState::from(current) {
                JobState::Idle => (JobState::Queued, QueueOutcome::Queued),
                JobState::Running => (JobState::RunningRequeued, QueueOutcome::Rerun),
                JobState::Queued | JobState::RunningRequeued => {
                    self.coalesced.fetch_add(1, Ordering::Relaxed);
                    return Ok(QueueOutcome::Coalesced);
                }
            };
            match self.state.compare_exchange_weak(
                current,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break outcome,
                Err(actual) => current = actual,
            }
        };

        if outcome == QueueOutcome::Queued {
            self.send()?;
        }
        Ok(outcome)
    }

    fn send(self: &Arc<Self>) -> Result<()> {
        let sent = !self.pool_closed.load(Ordering::Acquire)
            && self.queue.send(PoolMessage::Run(Arc::clone(self))).is_ok();
        // Shutdown may have started while sending; nobody drains after it.
        if sent && !self.pool_closed.load(Ordering::Acquire) {
            return Ok(());
        }
        self.abandon();
        Err(SpectraError::PoolShutdown)
    }

    /// Return a queued job that will never be picked up to idle
    pub(crate) fn abandon(&self) {
        let _ = self.state.compare_exchange(
            JobState::Queued as u8,
            JobState::Idle as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Worker side: run the target once, then settle the state.
    pub(crate) fn execute(self: &Arc<Self>) {
        if self
            .state
            .compare_exchange(
                JobState::Queued as u8,
                JobState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            tracing::warn!("Job {} picked up in state {:?}", self.name, self.state());
            return;
        }

        match self.target.upgrade() {
            Some(target) => {
                if debug_level() > 0 {
                    tracing::debug!("Running calculation for {}", self.name);
                }
                if catch_unwind(AssertUnwindSafe(|| target.calculate())).is_err() {
                    tracing::error!("Calculation for {} panicked", self.name);
                    target.calculation_panicked();
                }
            }
            None => tracing::warn!("{}", SpectraError::ChannelGone(self.name.clone())),
        }

        self.runs.fetch_add(1, Ordering::AcqRel);
        self.finish();
    }

    fn finish(self: &Arc<Self>) {
        let settled = self.state.compare_exchange(
            JobState::Running as u8,
            JobState::Idle as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if settled.is_err() {
            // RunningRequeued: nobody else moves out of this state
            self.state.store(JobState::Queued as u8, Ordering::Release);
            if let Err(e) = self.send() {
                tracing::warn!("Dropping rerun of {}: {}", self.name, e);
            }
        }
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("runs", &self.runs())
            .finish()
    }
}
