//! Test data builders for signals and configs

use spectra_rs::config::{ChannelConfig, SpectraConfig};
use spectra_rs::{OutputKind, WindowType};
use std::f64::consts::PI;
use std::path::PathBuf;

/// Builder for sampled test signals
pub struct SignalBuilder {
    len: usize,
    sample_rate: f64,
    offset: f64,
    tones: Vec<(f64, f64)>,
}

impl SignalBuilder {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            sample_rate: 1.0,
            offset: 0.0,
            tones: Vec::new(),
        }
    }

    pub fn sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    /// Add a cosine of `amplitude` at `frequency` Hz
    pub fn tone(mut self, frequency: f64, amplitude: f64) -> Self {
        self.tones.push((frequency, amplitude));
        self
    }

    pub fn build(self) -> Vec<f64> {
        (0..self.len)
            .map(|n| {
                let t = n as f64 / self.sample_rate;
                self.offset
                    + self
                        .tones
                        .iter()
                        .map(|(f, a)| a * (2.0 * PI * f * t).cos())
                        .sum::<f64>()
            })
            .collect()
    }
}

/// Builder for configs with a handful of channels
pub struct ConfigBuilder {
    config: SpectraConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SpectraConfig::default(),
        }
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.pool.workers = Some(workers);
        self
    }

    pub fn debug_level(mut self, level: i32) -> Self {
        self.config.debug_level = level;
        self
    }

    pub fn channel(mut self, name: &str, window: WindowType, sample_rate: f64) -> Self {
        self.config.channels.push(
            ChannelConfig::new(name)
                .with_window(window)
                .with_sample_rate(sample_rate),
        );
        self
    }

    /// Declare an output consumer on the last added channel
    pub fn output(mut self, kind: OutputKind, size: usize) -> Self {
        if let Some(channel) = self.config.channels.last_mut() {
            channel.outputs.push(spectra_rs::config::OutputRequest { kind, size });
        }
        self
    }

    /// Set the input file of the last added channel
    pub fn input_file(mut self, path: impl Into<PathBuf>) -> Self {
        if let Some(channel) = self.config.channels.last_mut() {
            channel.input_file = Some(path.into());
        }
        self
    }

    pub fn build(self) -> SpectraConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_builder() {
        let signal = SignalBuilder::new(4).offset(1.0).tone(0.25, 2.0).build();
        assert_eq!(signal.len(), 4);
        assert!((signal[0] - 3.0).abs() < 1e-12);
        assert!((signal[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .workers(2)
            .channel("A1", WindowType::Hann, 100.0)
            .output(OutputKind::Real, 64)
            .build();
        assert_eq!(config.pool.workers, Some(2));
        assert_eq!(config.channels[0].outputs.len(), 1);
    }
}
