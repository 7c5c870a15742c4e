//! Configuration module for spectra-rs
//!
//! Describes the worker pool and the channels to create at startup. Files
//! are TOML; a `.json` extension selects JSON instead.
//!
//! # Default Location
//!
//! - **Linux**: `~/.config/spectra-rs/spectra.toml`
//! - **macOS**: `~/Library/Application Support/spectra-rs/spectra.toml`
//! - **Windows**: `%APPDATA%\spectra-rs\spectra.toml`
//!
//! # Example
//!
//! ```toml
//! debug_level = 0
//!
//! [pool]
//! workers = 4
//!
//! [[channels]]
//! name = "A1"
//! window = "Hann"
//! sample_rate = 1000.0
//!
//! [[channels.outputs]]
//! kind = "real"
//! size = 1024
//! ```

use crate::analysis::WindowType;
use crate::error::{Result, SpectraError};
use crate::scheduler::default_worker_count;
use crate::types::OutputKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "spectra-rs";

/// Config filename
pub const CONFIG_FILE: &str = "spectra.toml";

/// Path of the config file in the platform config directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

/// Worker pool settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of worker threads; available parallelism when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
}

impl PoolConfig {
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(default_worker_count)
    }
}

/// A consumer declared up front for one output stream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputRequest {
    pub kind: OutputKind,
    pub size: usize,
}

/// One channel to create at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,

    #[serde(default)]
    pub window: WindowType,

    #[serde(default)]
    pub sample_rate: f64,

    /// Whitespace separated samples fed by the demo daemon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_file: Option<PathBuf>,

    #[serde(default)]
    pub outputs: Vec<OutputRequest>,
}

impl ChannelConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            window: WindowType::None,
            sample_rate: 0.0,
            input_file: None,
            outputs: Vec::new(),
        }
    }

    pub fn with_window(mut self, window: WindowType) -> Self {
        self.window = window;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_output(mut self, kind: OutputKind, size: usize) -> Self {
        self.outputs.push(OutputRequest { kind, size });
        self
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectraConfig {
    /// Diagnostic verbosity, 0 disables threshold logging
    #[serde(default)]
    pub debug_level: i32,

    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

impl SpectraConfig {
    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SpectraError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Self = if is_json(path) {
            serde_json::from_str(&content).map_err(|e| {
                SpectraError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?
        } else {
            toml::from_str(&content).map_err(|e| {
                SpectraError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?
        };

        config.validate()?;
        tracing::debug!("Loaded {} channel(s) from {:?}", config.channels.len(), path);
        Ok(config)
    }

    /// Load a config file, returning defaults if any error occurs
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Using default configuration: {}", e);
            Self::default()
        })
    }

    /// Save the config, creating parent directories as needed
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SpectraError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = if is_json(path) {
            serde_json::to_string_pretty(self)
                .map_err(|e| SpectraError::Config(format!("Failed to serialize config: {}", e)))?
        } else {
            toml::to_string_pretty(self)
                .map_err(|e| SpectraError::Config(format!("Failed to serialize config: {}", e)))?
        };

        std::fs::write(path, content).map_err(|e| {
            SpectraError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Check worker count, channel names and sample rates
    pub fn validate(&self) -> Result<()> {
        if self.pool.workers == Some(0) {
            return Err(SpectraError::Config(
                "pool.workers must be at least 1".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for channel in &self.channels {
            validate_channel_name(&channel.name)?;
            if !seen.insert(channel.name.as_str()) {
                return Err(SpectraError::Config(format!(
                    "duplicate channel '{}'",
                    channel.name
                )));
            }
            if !channel.sample_rate.is_finite() || channel.sample_rate < 0.0 {
                return Err(SpectraError::Config(format!(
                    "channel '{}': invalid sample rate {}",
                    channel.name, channel.sample_rate
                )));
            }
        }
        Ok(())
    }

    pub fn channel(&self, name: &str) -> Option<&ChannelConfig> {
        self.channels.iter().find(|c| c.name == name)
    }
}

/// Channel names are non-empty and contain no whitespace
pub fn validate_channel_name(name: &str) -> Result<()> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(SpectraError::InvalidChannelName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SpectraConfig::default();
        assert_eq!(config.debug_level, 0);
        assert!(config.channels.is_empty());
        assert!(config.pool.worker_count() >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let config: SpectraConfig = toml::from_str(
            r#"
            debug_level = 2

            [pool]
            workers = 3

            [[channels]]
            name = "A1"
            window = "Hann"
            sample_rate = 1000.0

            [[channels.outputs]]
            kind = "frequency-scale"
            size = 513

            [[channels]]
            name = "B2"
            "#,
        )
        .unwrap();

        assert_eq!(config.debug_level, 2);
        assert_eq!(config.pool.worker_count(), 3);
        let a1 = config.channel("A1").unwrap();
        assert_eq!(a1.window, WindowType::Hann);
        assert_eq!(
            a1.outputs,
            vec![OutputRequest {
                kind: OutputKind::FrequencyScale,
                size: 513
            }]
        );
        let b2 = config.channel("B2").unwrap();
        assert_eq!(b2.window, WindowType::None);
        assert_eq!(b2.sample_rate, 0.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_configs() {
        let mut config = SpectraConfig::default();
        config.pool.workers = Some(0);
        assert!(config.validate().is_err());

        let mut config = SpectraConfig::default();
        config.channels.push(ChannelConfig::new("has space"));
        assert!(matches!(
            config.validate(),
            Err(SpectraError::InvalidChannelName(_))
        ));

        let mut config = SpectraConfig::default();
        config.channels.push(ChannelConfig::new("A"));
        config.channels.push(ChannelConfig::new("A"));
        assert!(config.validate().is_err());

        let mut config = SpectraConfig::default();
        config
            .channels
            .push(ChannelConfig::new("A").with_sample_rate(f64::NAN));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_path_location() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("spectra-rs/spectra.toml"));
        }
    }
}
