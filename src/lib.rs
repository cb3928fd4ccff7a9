//! # Mott DAQ
//!
//! Readout controller for the UITF Mott polarimeter VME crate: one TI master,
//! one helicity decoder and two fADC250 digitizers (counting and
//! integrating).
//!
//! ## Crate Structure
//!
//! - **`mott_core`**: configuration tree, validator and [`RunConfiguration`]
//! - **`mott_hardware`**: one trait per module family, run-start programming,
//!   and simulated modules
//! - **`mott_readout`**: event assembly, sync-event reconciliation and the
//!   [`ReadoutController`] run-control entry points
//!
//! This crate adds what the `mott-roc` binary needs on top:
//!
//! - **`settings`**: [`settings::RocSettings`], layered with figment
//! - **`logging`**: tracing subscriber setup
//! - **`simulation`**: a controller over the simulated crate, and run totals

pub mod logging;
pub mod settings;
pub mod simulation;

pub use mott_core::config::RunConfiguration;
pub use mott_core::{ConfigError, Result as ConfigResult};
pub use mott_hardware::{HardwareError, ModuleId};
pub use mott_readout::{
    AssembledEvent, AssemblyFault, EventAssembler, ReadoutController, RocError, RunType,
    TriggerContext,
};

/// Re-export of the workspace crates.
pub mod prelude {
    pub use mott_core::config::{load_config_tree, validate, ConfigStore, RunConfiguration};
    pub use mott_hardware::{DigitizerCrate, HelicityDecoder, ModuleSet, TriggerInterface};
    pub use mott_readout::{ReadoutController, RunType, TriggerContext};
}
