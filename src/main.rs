//! spectra-rs - Demo Daemon
//!
//! Builds the channels described by a config file, feeds each channel that
//! names an input file through a triggering binding, and prints a JSON
//! summary of the resulting spectra.
//!
//! Usage: `spectra-rs [config]`

use serde::Serialize;
use spectra_rs::{
    config::{default_config_path, SpectraConfig},
    ChannelRegistry, ChannelStatus, LinkSpec, OutputKind, Result, ResultExt, SignalType,
    SpectraError,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CALCULATION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct ChannelReport {
    status: ChannelStatus,
    frequencies: Vec<f64>,
    magnitudes_db: Vec<f64>,
}

fn read_samples(path: &Path) -> Result<Vec<f64>> {
    let content = std::fs::read_to_string(path)
        .map_err(SpectraError::from)
        .with_context(|| format!("reading samples from {:?}", path))?;
    content
        .split_whitespace()
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|e| {
                    SpectraError::Config(format!("{:?}: bad sample '{}': {}", path, token, e))
                })
        })
        .collect()
}

fn load_config(arg: Option<PathBuf>) -> Result<SpectraConfig> {
    match arg {
        Some(path) => SpectraConfig::load(&path),
        None => match default_config_path() {
            Some(path) if path.exists() => SpectraConfig::load(&path),
            _ => {
                tracing::info!("No config file found, using defaults");
                Ok(SpectraConfig::default())
            }
        },
    }
}

fn run(registry: &ChannelRegistry, config: &SpectraConfig) -> Result<Vec<ChannelReport>> {
    let mut reports = Vec::new();

    for channel_config in &config.channels {
        let Some(input_file) = &channel_config.input_file else {
            continue;
        };
        let samples = read_samples(input_file)?;

        let input = registry.connect_parsed(&LinkSpec {
            channel: channel_config.name.clone(),
            signal: SignalType::InputReal,
            trigger: true,
        })?;
        let magnitude = registry.connect(&format!("{} output-magn", channel_config.name))?;
        let channel = input.channel();

        let target = channel.calc_count() + 1;
        input.write_samples(&samples)?;
        if !channel.wait_for_count(target, CALCULATION_TIMEOUT) {
            tracing::warn!("Timed out waiting for channel '{}'", channel.name());
            continue;
        }

        let nfreq = samples.len() / 2 + 1;
        let magnitudes_db = match magnitude.read_output(nfreq) {
            Ok(frame) => frame.map(|f| f.values().to_vec()).unwrap_or_default(),
            Err(e) => {
                tracing::warn!("{}", e);
                Vec::new()
            }
        };
        let frequencies = channel
            .output(OutputKind::FrequencyScale)
            .map(|f| f.values().to_vec())
            .unwrap_or_default();

        reports.push(ChannelReport {
            status: channel.status(),
            frequencies,
            magnitudes_db,
        });
    }
    Ok(reports)
}

fn main() -> std::process::ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,spectra_rs=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let result = load_config(std::env::args_os().nth(1).map(PathBuf::from)).and_then(|config| {
        let registry = ChannelRegistry::from_config(&config)?;
        let reports = run(&registry, &config)?;
        let json = serde_json::to_string_pretty(&reports)
            .map_err(|e| SpectraError::Config(format!("Failed to serialize report: {}", e)))?;
        println!("{}", json);

        tracing::info!("Shutting down...");
        registry.shutdown();
        Ok(())
    });

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::ExitCode::FAILURE
        }
    }
}
