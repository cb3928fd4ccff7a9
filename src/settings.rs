//! Application settings for the `mott-roc` binary.
//!
//! These are the knobs of the program itself (logging, default run type,
//! simulation pacing), not the module configuration, which lives in its own
//! TOML file and goes through the validator.
//!
//! Settings are layered:
//! 1. Defaults from [`RocSettings::default`]
//! 2. A TOML file (optional, `config/roc.toml` unless given)
//! 3. Environment variables prefixed with `MOTT_ROC_`; nested fields use
//!    double underscores, e.g. `MOTT_ROC_SIMULATION__SYNC_EVERY=100`

use anyhow::{bail, Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment, Provider,
};
use mott_readout::buffer::DEFAULT_CAPACITY_WORDS;
use mott_readout::RunType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default settings file.
pub const DEFAULT_SETTINGS_PATH: &str = "config/roc.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "MOTT_ROC_";

/// Top-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocSettings {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    pub log_format: String,
    /// Run type used when none is given on the command line
    pub run_type: String,
    /// Module configuration file
    pub config_path: PathBuf,
    /// Readout controller id, tags the prestart configuration bank
    pub roc_id: u16,
    /// Event buffer capacity in 32-bit words
    pub event_capacity_words: usize,
    /// Simulated-crate settings
    #[serde(default)]
    pub simulation: SimulationSettings,
}

/// Settings of the simulated crate used by `simulate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Delay between simulated triggers
    pub trigger_interval_ms: u64,
    /// Flag every n-th event as a sync event (0 = never)
    pub sync_every: u32,
    /// Payload seed; random when unset
    pub seed: Option<u64>,
    /// Probability of a block-transfer error per digitizer read
    pub error_rate: f64,
    /// ADC words per digitizer block
    pub samples: usize,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            trigger_interval_ms: 10,
            sync_every: 0,
            seed: None,
            error_rate: 0.0,
            samples: 16,
        }
    }
}

impl Default for RocSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            run_type: "counting".to_string(),
            config_path: PathBuf::from("config/uitf_mott.toml"),
            roc_id: 1,
            event_capacity_words: DEFAULT_CAPACITY_WORDS,
            simulation: SimulationSettings::default(),
        }
    }
}

impl Provider for RocSettings {
    fn metadata(&self) -> figment::Metadata {
        figment::Metadata::named("Readout Controller Defaults")
    }

    fn data(
        &self,
    ) -> Result<figment::value::Map<figment::Profile, figment::value::Dict>, figment::Error> {
        Serialized::defaults(RocSettings::default()).data()
    }
}

impl RocSettings {
    /// Load defaults, then `path` (or [`DEFAULT_SETTINGS_PATH`]) if it
    /// exists, then `MOTT_ROC_` environment variables, and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(RocSettings::default());

        let file = path.unwrap_or_else(|| Path::new(DEFAULT_SETTINGS_PATH));
        if file.exists() {
            figment = figment.merge(Toml::file(file));
        } else if path.is_some() {
            bail!("Settings file not found: {}", file.display());
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let settings: RocSettings = figment
            .extract()
            .context("Failed to extract settings from Figment")?;
        settings.validate().context("Settings validation failed")?;
        Ok(settings)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            bail!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            );
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            bail!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.log_format,
                valid_formats.join(", ")
            );
        }

        if self.run_type.parse::<RunType>().is_err() {
            bail!("Invalid run_type '{}'. Must be counting or integrating", self.run_type);
        }

        if self.event_capacity_words < 256 {
            bail!(
                "event_capacity_words {} is too small (minimum 256)",
                self.event_capacity_words
            );
        }

        if !(0.0..=1.0).contains(&self.simulation.error_rate) {
            bail!(
                "simulation.error_rate {} must be between 0 and 1",
                self.simulation.error_rate
            );
        }
        Ok(())
    }

    /// The default run type.
    pub fn run_type(&self) -> RunType {
        RunType::from_user_string(&self.run_type)
    }
}
