//! Analysis module for signal processing
//!
//! This module provides the per-channel transform machinery:
//! - Windowed real-to-complex FFT with cached plans
//! - Window functions (boxcar and Hann)
//! - Phase timing for threshold-gated diagnostics

pub mod engine;
pub mod timing;
pub mod window;

pub use engine::{DirtyFlags, Plan, TransformEngine};
pub use timing::{debug_level, set_debug_level, PhaseTimer};
pub use window::WindowType;
