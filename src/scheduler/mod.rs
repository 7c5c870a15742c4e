//! Bounded worker pool shared by all channels
//!
//! Calculations run on a fixed set of threads fed from one crossbeam
//! queue. Triggering only enqueues and returns; the per-job state in
//! [`Job`] guarantees a target is never in flight more than once.
//!
//! # Example
//!
//! ```ignore
//! use spectra_rs::scheduler::{Calculation, WorkerPool};
//!
//! let pool = WorkerPool::new(4)?;
//! let job = pool.create_job("A1", Arc::downgrade(&target));
//! job.queue()?;
//! ```

pub mod job;

pub use job::{Calculation, Job, JobState, QueueOutcome};

use crate::error::{Result, SpectraError};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::thread::JoinHandle;

/// Messages consumed by pool workers
pub(crate) enum PoolMessage {
    /// Execute a job
    Run(Arc<Job>),
    /// Exit the worker loop
    Shutdown,
}

/// Number of workers used when none is configured
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
}

/// Fixed-size pool of calculation threads
pub struct WorkerPool {
    sender: Sender<PoolMessage>,
    receiver: Receiver<PoolMessage>,
    closed: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl WorkerPool {
    /// Spawn `size` worker threads
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(SpectraError::Config(
                "worker pool needs at least one thread".to_string(),
            ));
        }

        let (sender, receiver) = unbounded();
        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let rx = receiver.clone();
            let handle = std::thread::Builder::new()
                .name(format!("spectra-worker-{}", id))
                .spawn(move || worker_loop(id, rx))
                .map_err(|e| SpectraError::Io(e).with_context("Failed to spawn worker"))?;
            workers.push(handle);
        }

        tracing::info!("Worker pool started with {} threads", size);
        Ok(Self {
            sender,
            receiver,
            closed: Arc::new(AtomicBool::new(false)),
            workers: Mutex::new(workers),
            size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether [`shutdown`](Self::shutdown) has started
    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Create the job that runs `target` on this pool
    pub fn create_job(&self, name: impl Into<String>, target: Weak<dyn Calculation>) -> Arc<Job> {
        Job::new(name, target, self.sender.clone(), Arc::clone(&self.closed))
    }

    /// Let queued work finish, then stop and join all workers.
    ///
    /// Jobs queued afterwards fail with [`SpectraError::PoolShutdown`]. Reruns
    /// sent by a finishing job after the workers stopped are discarded and
    /// their jobs return to idle.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        let workers: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        if workers.is_empty() {
            return;
        }

        for _ in 0..workers.len() {
            let _ = self.sender.send(PoolMessage::Shutdown);
        }
        for handle in workers {
            if handle.join().is_err() {
                tracing::error!("Worker thread panicked during shutdown");
            }
        }
        for message in self.receiver.try_iter() {
            if let PoolMessage::Run(job) = message {
                tracing::debug!("Discarding queued run of {}", job.name());
                job.abandon();
            }
        }
        tracing::info!("Worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size)
            .field("queued", &self.sender.len())
            .finish()
    }
}

fn worker_loop(id: usize, rx: Receiver<PoolMessage>) {
    tracing::debug!("Worker {} started", id);
    for message in rx.iter() {
        match message {
            PoolMessage::Run(job) => job.execute(),
            PoolMessage::Shutdown => break,
        }
    }
    tracing::debug!("Worker {} stopped", id);
}
