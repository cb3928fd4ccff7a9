//! Tracing subscriber setup for the `mott-roc` binary.
//!
//! The library crates only emit `tracing` events; this module decides where
//! they go:
//! - pretty, compact or JSON output
//! - level from [`RocSettings`], overridden by `RUST_LOG` when set
//!
//! # Example
//! ```no_run
//! use mott_daq::{logging, settings::RocSettings};
//!
//! # fn main() -> anyhow::Result<()> {
//! let settings = RocSettings::load(None)?;
//! logging::init_from_settings(&settings)?;
//! tracing::info!("Readout controller started");
//! # Ok(())
//! # }
//! ```

use crate::settings::RocSettings;
use anyhow::{anyhow, Result};
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line with colors, for a terminal
    Pretty,
    /// One line per event, no colors
    Compact,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    /// Parse `pretty`, `compact` or `json`, case-insensitively.
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(anyhow!(
                "Invalid log format '{name}'. Must be one of: pretty, compact, json"
            )),
        }
    }
}

/// Subscriber options.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Lowest level shown when `RUST_LOG` is unset
    pub level: Level,
    /// Output format
    pub format: LogFormat,
    /// Log span open/close
    pub with_span_events: bool,
    /// Include file and line
    pub with_file_and_line: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            with_span_events: false,
            with_file_and_line: false,
        }
    }
}

impl LoggingConfig {
    /// Config at `level` with default options.
    pub fn new(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Logging options from the application settings.
    pub fn from_settings(settings: &RocSettings) -> Result<Self> {
        Ok(Self {
            level: parse_log_level(&settings.log_level)?,
            format: LogFormat::parse(&settings.log_format)?,
            ..Default::default()
        })
    }

    /// Set output format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Enable or disable span events.
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.with_span_events = enabled;
        self
    }
}

/// Initialize logging from the application settings.
pub fn init_from_settings(settings: &RocSettings) -> Result<()> {
    init(LoggingConfig::from_settings(settings)?)
}

/// Install the global subscriber. A second call is a no-op.
pub fn init(config: LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_lowercase()));

    let span_events = if config.with_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer = fmt::layer()
        .with_span_events(span_events)
        .with_file(config.with_file_and_line)
        .with_line_number(config.with_file_and_line)
        .with_target(false);

    let layer = match config.format {
        LogFormat::Pretty => layer.pretty().with_filter(env_filter).boxed(),
        LogFormat::Compact => layer
            .compact()
            .with_ansi(false)
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Json => layer.json().with_filter(env_filter).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .or_else(|e| {
            if e
                .to_string()
                .contains("a global default trace dispatcher has already been set")
            {
                Ok(())
            } else {
                Err(anyhow!("Failed to initialize tracing: {e}"))
            }
        })
}

/// Parse a log level name, case-insensitively.
pub fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(anyhow!(
            "Invalid log level '{level}'. Must be one of: trace, debug, info, warn, error"
        )),
    }
}
