//! Error types for VME module access.
//!
//! Every failure names the module it came from and the operation that was
//! attempted, so a log line is enough to find the register write that went
//! wrong.

use std::fmt;
use thiserror::Error;

/// Result type alias for module operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// A module in the readout crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModuleId {
    /// The trigger interface.
    TriggerInterface,
    /// The helicity decoder.
    HelicityDecoder,
    /// The fADC250 in the given slot.
    Digitizer(u32),
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TriggerInterface => write!(f, "TI"),
            Self::HelicityDecoder => write!(f, "Helicity Decoder"),
            Self::Digitizer(slot) => write!(f, "fADC250 (slot {slot})"),
        }
    }
}

/// Errors raised by module operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HardwareError {
    /// Nothing answered at the configured address.
    #[error("{module}: no module found at address {address:#x}")]
    NotFound {
        /// Module that was expected.
        module: ModuleId,
        /// A24 address that was probed.
        address: u32,
    },

    /// The module was used before `init`.
    #[error("{module}: {operation} before init")]
    NotInitialized {
        /// Module addressed.
        module: ModuleId,
        /// Operation attempted.
        operation: &'static str,
    },

    /// A parameter was outside what the module accepts.
    #[error("{module}: {operation} rejected: {reason}")]
    Rejected {
        /// Module addressed.
        module: ModuleId,
        /// Operation attempted.
        operation: &'static str,
        /// Why the module refused it.
        reason: String,
    },

    /// VME bus error during a transfer or register access.
    #[error("{module}: bus error during {operation}")]
    Bus {
        /// Module addressed.
        module: ModuleId,
        /// Operation attempted.
        operation: &'static str,
    },
}

impl HardwareError {
    /// Module the error came from.
    pub fn module(&self) -> ModuleId {
        match self {
            Self::NotFound { module, .. }
            | Self::NotInitialized { module, .. }
            | Self::Rejected { module, .. }
            | Self::Bus { module, .. } => *module,
        }
    }

    /// Operation that failed, if the error names one.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Self::NotFound { .. } => None,
            Self::NotInitialized { operation, .. }
            | Self::Rejected { operation, .. }
            | Self::Bus { operation, .. } => Some(operation),
        }
    }
}
