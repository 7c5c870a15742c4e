//! Core data types for spectra-rs
//!
//! # Main Types
//!
//! - [`SignalType`] - Role of a binding between an external record and a channel
//! - [`OutputKind`] - The six published output streams of a channel
//! - [`ScanKind`] - Groups of downstream consumers notified together
//! - [`OutputFrame`] - An immutable published output snapshot
//! - [`ChannelStatus`] - Serializable summary of a channel

use crate::analysis::WindowType;
use crate::error::{Result, SpectraError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// Role of a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalType {
    /// Time-domain samples
    InputReal,
    /// Window type selector
    SetWindowType,
    /// Sample frequency in Hz
    SetSampleFreq,
    /// Duration of the last calculation
    ExecutionTime,
    /// Real part of the spectrum
    OutputReal,
    /// Imaginary part of the spectrum
    OutputImag,
    /// Magnitude in dB
    OutputMagn,
    /// Phase in radians
    OutputPhas,
    /// Frequency of each bin
    OutputFscale,
    /// Window coefficients
    OutputWindow,
}

impl SignalType {
    /// Link name of this signal type
    pub fn name(&self) -> &'static str {
        match self {
            SignalType::InputReal => "input-real",
            SignalType::SetWindowType => "windowtype",
            SignalType::SetSampleFreq => "sample-freq",
            SignalType::ExecutionTime => "exectime",
            SignalType::OutputReal => "output-real",
            SignalType::OutputImag => "output-imag",
            SignalType::OutputMagn => "output-magn",
            SignalType::OutputPhas => "output-phas",
            SignalType::OutputFscale => "output-fscale",
            SignalType::OutputWindow => "output-window",
        }
    }

    /// All signal types
    pub fn all() -> &'static [SignalType] {
        &[
            SignalType::InputReal,
            SignalType::SetWindowType,
            SignalType::SetSampleFreq,
            SignalType::ExecutionTime,
            SignalType::OutputReal,
            SignalType::OutputImag,
            SignalType::OutputMagn,
            SignalType::OutputPhas,
            SignalType::OutputFscale,
            SignalType::OutputWindow,
        ]
    }

    /// Whether this signal feeds data or parameters into the engine
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            SignalType::InputReal | SignalType::SetWindowType | SignalType::SetSampleFreq
        )
    }

    /// Output stream consumed by this signal, if any
    pub fn output_kind(&self) -> Option<OutputKind> {
        match self {
            SignalType::OutputReal => Some(OutputKind::Real),
            SignalType::OutputImag => Some(OutputKind::Imag),
            SignalType::OutputMagn => Some(OutputKind::Magnitude),
            SignalType::OutputPhas => Some(OutputKind::Phase),
            SignalType::OutputFscale => Some(OutputKind::FrequencyScale),
            SignalType::OutputWindow => Some(OutputKind::Window),
            _ => None,
        }
    }
}

impl FromStr for SignalType {
    type Err = SpectraError;

    fn from_str(s: &str) -> Result<Self> {
        SignalType::all()
            .iter()
            .copied()
            .find(|sig| sig.name() == s)
            .ok_or_else(|| SpectraError::UnknownSignalType(s.to_string()))
    }
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Published output streams of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputKind {
    Real,
    Imag,
    Magnitude,
    Phase,
    FrequencyScale,
    Window,
}

impl OutputKind {
    /// Number of output streams
    pub const COUNT: usize = 6;

    /// Position in per-stream tables
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Scan group notified when this stream is republished
    pub fn scan_kind(&self) -> ScanKind {
        match self {
            OutputKind::FrequencyScale => ScanKind::Scale,
            OutputKind::Window => ScanKind::Window,
            _ => ScanKind::Value,
        }
    }
}

/// Groups of downstream consumers notified together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanKind {
    /// Spectrum values (real, imaginary, magnitude, phase)
    Value,
    /// Frequency scale
    Scale,
    /// Window shape
    Window,
}

/// An immutable published output snapshot
#[derive(Debug, Clone)]
pub struct OutputFrame {
    /// Published values, zero padded to the largest declared consumer size
    pub data: Arc<[f64]>,
    /// Number of meaningful leading elements
    pub valid_len: usize,
    /// Time of the trigger that produced this frame
    pub timestamp: Option<DateTime<Utc>>,
}

impl OutputFrame {
    /// The meaningful leading elements
    pub fn values(&self) -> &[f64] {
        &self.data[..self.valid_len.min(self.data.len())]
    }
}

/// Serializable summary of a channel
#[derive(Debug, Clone, Serialize)]
pub struct ChannelStatus {
    pub name: String,
    pub calc_count: u64,
    pub valid: bool,
    pub last_duration_secs: f64,
    pub last_trigger: Option<DateTime<Utc>>,
    pub input_size: usize,
    pub window: WindowType,
    pub sample_rate: f64,
    pub has_trigger: bool,
    pub inputs: usize,
    pub outputs: usize,
}
