//! # spectra-rs: Triggered FFT Channels
//!
//! Turns blocks of real-valued time-domain samples into one-sided spectra.
//! Each named channel owns a windowed real-to-complex transform and
//! recalculates on a shared worker pool whenever its input is triggered.
//!
//! ## Architecture
//!
//! - **Analysis**: Window functions and the transform engine with cached plans
//! - **Scheduler**: Bounded worker pool; at most one run in flight per channel
//! - **Channel**: Named channels, bindings to external records, and the registry
//! - **Communication**: Crossbeam channels feed jobs to the workers
//!
//! ## Configuration
//!
//! Channels and pool size can be declared up front in a TOML file stored under
//! the platform config directory (`spectra-rs/spectra.toml`).
//!
//! ## Example
//!
//! ```ignore
//! use spectra_rs::{ChannelRegistry, OutputKind, WorkerPool};
//! use std::time::Duration;
//!
//! let registry = ChannelRegistry::new(WorkerPool::new(2)?);
//! let input = registry.connect("A1 input-real trigger=Y")?;
//! let real = registry.connect("A1 output-real")?;
//!
//! input.write_samples(&[1.0, 2.0, 3.0, 4.0])?;
//! input.channel().wait_for_count(1, Duration::from_secs(1));
//!
//! let frame = real.read_output(3)?.expect("published");
//! assert_eq!(frame.values(), &[10.0, -2.0, -2.0]);
//! ```

pub mod analysis;
pub mod channel;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod types;

// Re-export commonly used types
pub use analysis::{TransformEngine, WindowType};
pub use channel::{Binding, Channel, ChannelRegistry, LinkSpec, LogNotifier, ScanNotifier};
pub use config::SpectraConfig;
pub use error::{Result, ResultExt, SpectraError};
pub use scheduler::{Calculation, Job, QueueOutcome, WorkerPool};
pub use types::{ChannelStatus, OutputFrame, OutputKind, ScanKind, SignalType};
