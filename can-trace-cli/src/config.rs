//! Configuration loading and merging
//!
//! A run is described by an optional `config.toml` plus command-line flags.
//! Flags win over file values; lists given on the command line replace the
//! file's lists instead of extending them.

use anyhow::{Context, Result};
use can_trace_decoder::{ConsistencyTriple, PipelineConfig, TraceFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Signals analyzed when neither the config file nor the command line names any
pub const DEFAULT_SIGNALS: &[&str] = &[
    "SOCave292",
    "SOCmax292",
    "SOCmin292",
    "SOCUI292",
    "ChargeLinePower264",
    "ChargeLineVoltage264",
    "ChargeLineCurrent264",
    "PCS_hvChargeStatus",
    "BMS_maxDischargePower",
    "BMS_maxRegenPower",
];

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub signals: SignalsConfig,
    #[serde(default)]
    pub consistency: Option<ConsistencyConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct InputConfig {
    #[serde(default)]
    pub traces: Vec<PathBuf>,
    #[serde(default)]
    pub dbc: Vec<PathBuf>,
    /// Forced format for every trace; guessed per file when absent
    pub format: Option<TraceFormat>,
    /// First cell of the CSV header row
    pub csv_header_marker: Option<String>,
    /// Fixed raw hex identifier width (3 or 4); guessed per line when absent
    pub raw_hex_id_digits: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SignalsConfig {
    #[serde(default)]
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConsistencyConfig {
    pub max: String,
    pub avg: String,
    pub min: String,
}

impl From<ConsistencyConfig> for ConsistencyTriple {
    fn from(config: ConsistencyConfig) -> Self {
        ConsistencyTriple::new(config.max, config.avg, config.min)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default)]
    pub print_observations: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub traces: Vec<PathBuf>,
    pub dbc: Vec<PathBuf>,
    pub format: Option<TraceFormat>,
    pub csv_header_marker: Option<String>,
    pub raw_hex_id_digits: Option<usize>,
    pub signals: Vec<String>,
    pub triple: Option<ConsistencyTriple>,
    pub json: bool,
    pub print_observations: bool,
}

/// Fully resolved settings for one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub traces: Vec<PathBuf>,
    pub dbc: Vec<PathBuf>,
    pub format: Option<TraceFormat>,
    pub csv_header_marker: Option<String>,
    pub raw_hex_id_digits: Option<usize>,
    pub signals: Vec<String>,
    pub triple: Option<ConsistencyTriple>,
    pub output: OutputFormat,
    pub print_observations: bool,
}

impl RunSettings {
    /// Format for one trace: the forced one, else guessed from its extension
    pub fn format_for(&self, trace: &Path) -> Option<TraceFormat> {
        self.format.or_else(|| TraceFormat::from_extension(trace))
    }

    /// Pipeline configuration for one trace in the given format
    pub fn pipeline_config(&self, format: TraceFormat) -> PipelineConfig {
        let mut config = PipelineConfig::new(format).with_signals(self.signals.iter().cloned());
        if let Some(triple) = &self.triple {
            config = config.with_consistency_triple(triple.clone());
        }
        if let Some(marker) = &self.csv_header_marker {
            config = config.with_csv_header_marker(marker.as_str());
        }
        if let Some(digits) = self.raw_hex_id_digits {
            config = config.with_raw_hex_id_digits(digits);
        }
        config
    }
}

impl AppConfig {
    /// Apply command-line values on top of the file configuration
    ///
    /// With no signals configured anywhere the SOC/charging defaults are used,
    /// together with the SOC max/avg/min triple unless a triple was given.
    pub fn resolve(self, cli: CliOverrides) -> RunSettings {
        let pick = |cli_list: Vec<PathBuf>, file_list: Vec<PathBuf>| {
            if cli_list.is_empty() {
                file_list
            } else {
                cli_list
            }
        };

        let configured_signals = if cli.signals.is_empty() {
            self.signals.names
        } else {
            cli.signals
        };
        let configured_triple = cli.triple.or_else(|| self.consistency.map(Into::into));

        let (signals, triple) = if configured_signals.is_empty() {
            log::debug!("No signals configured, using the SOC defaults");
            let triple = configured_triple.or_else(|| {
                Some(ConsistencyTriple::new("SOCmax292", "SOCave292", "SOCmin292"))
            });
            (
                DEFAULT_SIGNALS.iter().map(|s| s.to_string()).collect(),
                triple,
            )
        } else {
            (configured_signals, configured_triple)
        };

        RunSettings {
            traces: pick(cli.traces, self.input.traces),
            dbc: pick(cli.dbc, self.input.dbc),
            format: cli.format.or(self.input.format),
            csv_header_marker: cli.csv_header_marker.or(self.input.csv_header_marker),
            raw_hex_id_digits: cli.raw_hex_id_digits.or(self.input.raw_hex_id_digits),
            signals,
            triple,
            output: if cli.json {
                OutputFormat::Json
            } else {
                self.output.format
            },
            print_observations: cli.print_observations || self.output.print_observations,
        }
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}
