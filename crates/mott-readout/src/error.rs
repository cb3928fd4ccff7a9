//! Errors of the readout controller's run-control entry points.
//!
//! Per-event problems are not errors: they are [`AssemblyFault`]s recorded
//! in the event.
//!
//! [`AssemblyFault`]: crate::fault::AssemblyFault

use mott_core::ConfigError;
use mott_hardware::HardwareError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for controller operations.
pub type Result<T> = std::result::Result<T, RocError>;

/// Errors returned by [`ReadoutController`](crate::ReadoutController).
#[derive(Error, Debug)]
pub enum RocError {
    /// The configuration could not be loaded or validated.
    #[error("configuration rejected: {0}")]
    Config(#[from] ConfigError),

    /// A module refused a programming write.
    #[error("module programming failed: {0}")]
    Programming(#[from] HardwareError),

    /// A run-control transition failed.
    #[error("{phase} failed: {error}")]
    RunControl {
        /// Phase being executed (`download`, `go`, ...).
        phase: &'static str,
        /// Underlying module error.
        error: HardwareError,
    },

    /// An operation needs a validated configuration and none is stored.
    #[error("no validated configuration; download first")]
    NotConfigured,

    /// `validate` was called before any file was loaded.
    #[error("no configuration file loaded")]
    NoConfigLoaded,

    /// Reading a file for the prestart event failed.
    #[error("failed to read {}: {message}", path.display())]
    Io {
        /// File read.
        path: PathBuf,
        /// OS error text.
        message: String,
    },

    /// The configuration file does not fit in one event.
    #[error("{} is {bytes} bytes, an event holds at most {max}", path.display())]
    ConfigFileTooLarge {
        /// File read.
        path: PathBuf,
        /// File size.
        bytes: usize,
        /// Largest file that fits.
        max: usize,
    },
}

impl RocError {
    pub(crate) fn run_control(phase: &'static str) -> impl FnOnce(HardwareError) -> Self {
        move |error| Self::RunControl { phase, error }
    }

    /// True if the error came from the configuration rather than a module.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::NotConfigured | Self::NoConfigLoaded)
    }
}
