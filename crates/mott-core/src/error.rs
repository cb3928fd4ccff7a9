//! Error types for configuration loading.
//!
//! Every variant of [`ConfigError`] is fatal to a configuration load: the
//! store keeps whatever it held before and no hardware gets programmed from
//! the rejected tree.
//!
//! ## Error Hierarchy
//!
//! - **Structural**: `MissingSection`, `WrongCardinality`, `UnknownModuleType`.
//!   The tree parsed but its shape does not describe the crate.
//! - **Value**: `InvalidValue`. A scalar is present but cannot be used to
//!   program a 32-bit register.
//! - **Source**: `Parse`, `Io`. The file itself could not be read.

use thiserror::Error;

/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while reading or validating a run configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required section is absent, empty, or not a group/list.
    #[error("{section} missing from config")]
    MissingSection {
        /// Dotted path of the section, e.g. `ti.random_pulser`.
        section: String,
    },

    /// A fixed-size list has the wrong number of entries.
    #[error("{what}: expected {expected} entries, found {found}")]
    WrongCardinality {
        /// What was being counted.
        what: String,
        /// Required number of entries.
        expected: usize,
        /// Number of entries actually present.
        found: usize,
    },

    /// A digitizer `type` string is neither `counting` nor `integrating`.
    #[error("unknown fadc250 type ({value}) at fadc250[{index}]")]
    UnknownModuleType {
        /// List position of the offending element.
        index: usize,
        /// The type string as written, or `<missing>`.
        value: String,
    },

    /// A scalar is present but not usable (wrong kind or out of range).
    #[error("invalid value for {path}: {reason}")]
    InvalidValue {
        /// Dotted path of the value.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The configuration file is not well-formed.
    #[error("Error in {path}:{line} - {reason}")]
    Parse {
        /// File the text came from (`<string>` for in-memory sources).
        path: String,
        /// 1-based line of the failure, 0 when unknown.
        line: usize,
        /// Parser message.
        reason: String,
    },

    /// The configuration file could not be read.
    #[error("Failed to read config file '{path}': {message}")]
    Io {
        /// File that failed.
        path: String,
        /// Operating system message.
        message: String,
    },
}

impl ConfigError {
    pub(crate) fn missing(section: impl Into<String>) -> Self {
        Self::MissingSection {
            section: section.into(),
        }
    }

    pub(crate) fn cardinality(what: impl Into<String>, expected: usize, found: usize) -> Self {
        Self::WrongCardinality {
            what: what.into(),
            expected,
            found,
        }
    }

    pub(crate) fn invalid(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for errors about the shape of the tree rather than its source.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::MissingSection { .. }
                | Self::WrongCardinality { .. }
                | Self::UnknownModuleType { .. }
        )
    }
}
