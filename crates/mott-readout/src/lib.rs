//! `mott-readout`
//!
//! Per-trigger readout for the Mott polarimeter crate.
//!
//! - [`assembler`]: reads TI, helicity decoder and the active fADC250 into
//!   one banked [`EventBuffer`]
//! - [`reconcile`]: residual-data sweep on sync events
//! - [`controller`]: [`ReadoutController`], the configuration store plus the
//!   run-control phases
//! - [`config_bank`]: the configuration-file event written at prestart
//!
//! # Example
//!
//! ```no_run
//! use mott_hardware::mock::{CallLog, MockDigitizerCrate, MockHelicityDecoder, MockTriggerInterface};
//! use mott_hardware::ModuleSet;
//! use mott_readout::ReadoutController;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), mott_readout::RocError> {
//! let log = CallLog::new();
//! let modules = ModuleSet::new(
//!     MockTriggerInterface::new(log.clone()),
//!     MockHelicityDecoder::new(log.clone()),
//!     MockDigitizerCrate::new(log),
//! );
//! let mut roc = ReadoutController::new(modules);
//! roc.download(Path::new("config/uitf_mott.toml"), "counting")?;
//! roc.go()?;
//! let event = roc.trigger()?;
//! println!("{} words, {} faults", event.buffer.len(), event.faults.len());
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod buffer;
pub mod config_bank;
pub mod controller;
pub mod error;
pub mod fault;
pub mod poll;
pub mod reconcile;
pub mod run_type;

pub use assembler::{AssembledEvent, EventAssembler, TriggerContext};
pub use buffer::{BankView, EventBuffer};
pub use controller::ReadoutController;
pub use error::{Result, RocError};
pub use fault::{AssemblyFault, SourceReadState};
pub use reconcile::SyncReconciler;
pub use run_type::RunType;
