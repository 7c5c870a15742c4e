//! Error handling for spectra-rs
//!
//! This module defines the crate error type and a Result alias for use
//! throughout the library. Calculation failures are never retried
//! automatically: a failing cycle clears the channel's validity flag and
//! the next trigger starts over.

use thiserror::Error;

/// Main error type for spectra-rs operations
#[derive(Error, Debug)]
pub enum SpectraError {
    /// A zero-length input buffer was delivered to a transform engine
    #[error("Input buffer is empty")]
    EmptyInput,

    /// Transform requested before a plan was built
    #[error("No transform plan available")]
    PlanMissing,

    /// The cached plan was built for a different input length
    #[error("Plan built for {planned} samples, input has {actual}")]
    PlanLengthMismatch { planned: usize, actual: usize },

    /// Plan construction or validation failed
    #[error("Plan error: {0}")]
    Plan(String),

    /// Executing a plan failed
    #[error("Transform error: {0}")]
    Transform(String),

    /// Raw or named window selector not recognised
    #[error("Invalid window type: {0}")]
    InvalidWindowType(String),

    /// Signal type name not recognised
    #[error("Unknown signal type: {0}")]
    UnknownSignalType(String),

    /// Link string could not be parsed
    #[error("Invalid link '{link}': {message}")]
    InvalidLink { link: String, message: String },

    /// Channel names must be non-empty and free of whitespace
    #[error("Invalid channel name '{0}'")]
    InvalidChannelName(String),

    /// Operation not supported by the binding's signal type
    #[error("Binding for {signal} cannot {operation}")]
    SignalMismatch {
        signal: &'static str,
        operation: &'static str,
    },

    /// Output read while the last calculation was invalid
    #[error("Channel '{0}' has no valid output")]
    StaleOutput(String),

    /// Lookup of a channel that was never created
    #[error("No such channel '{0}'")]
    NoSuchChannel(String),

    /// The channel backing a job has been dropped
    #[error("Channel '{0}' no longer exists")]
    ChannelGone(String),

    /// The worker pool is no longer accepting jobs
    #[error("Worker pool has shut down")]
    PoolShutdown,

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<SpectraError>,
    },
}

impl SpectraError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        SpectraError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a transform error from a realfft error
    pub fn from_fft_error(err: realfft::FftError) -> Self {
        SpectraError::Transform(err.to_string())
    }
}

/// Result type alias for spectra-rs operations
pub type Result<T> = std::result::Result<T, SpectraError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
