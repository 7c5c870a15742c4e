//! Window functions applied to time-domain samples before the transform

use crate::error::{Result, SpectraError};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::str::FromStr;

/// Window function type for FFT preprocessing
///
/// The discriminants are the raw values written by enumerated records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u32)]
pub enum WindowType {
    /// Boxcar window (no shaping)
    #[default]
    None = 0,
    /// Hann window, `sin²(π·n/(N-1))`
    Hann = 1,
}

impl WindowType {
    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            WindowType::None => "None",
            WindowType::Hann => "Hann",
        }
    }

    /// Window type actually usable for `n` samples.
    ///
    /// A single sample cannot carry a shaping window, so anything but
    /// boxcar degrades to [`WindowType::None`].
    pub fn effective(self, n: usize) -> WindowType {
        if n <= 1 {
            WindowType::None
        } else {
            self
        }
    }

    /// Fill `window` with the coefficients for its length
    pub fn fill(&self, window: &mut [f64]) {
        let n = window.len();
        match self.effective(n) {
            WindowType::None => window.fill(1.0),
            WindowType::Hann => {
                let fact = PI / (n - 1) as f64;
                for (i, w) in window.iter_mut().enumerate() {
                    let s = (fact * i as f64).sin();
                    *w = s * s;
                }
            }
        }
    }

    /// Generate window coefficients for n samples
    pub fn generate(&self, n: usize) -> Vec<f64> {
        let mut window = vec![0.0; n];
        self.fill(&mut window);
        window
    }
}

impl TryFrom<u32> for WindowType {
    type Error = SpectraError;

    fn try_from(raw: u32) -> Result<Self> {
        match raw {
            0 => Ok(WindowType::None),
            1 => Ok(WindowType::Hann),
            other => Err(SpectraError::InvalidWindowType(other.to_string())),
        }
    }
}

impl FromStr for WindowType {
    type Err = SpectraError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "boxcar" => Ok(WindowType::None),
            "hann" => Ok(WindowType::Hann),
            _ => Err(SpectraError::InvalidWindowType(s.to_string())),
        }
    }
}

impl std::fmt::Display for WindowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}
