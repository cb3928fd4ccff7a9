//! `mott-hardware`
//!
//! Module-level access for the Mott readout crate: the TI master, the
//! helicity decoder and the two fADC250 digitizers.
//!
//! - [`hal`]: one trait per module family, plus [`hal::ModuleSet`]
//! - [`programmer`]: run-start programming from a validated configuration
//! - [`mock`]: in-memory modules with scripted behavior, for tests and for
//!   running the readout without a crate
//! - [`error`]: [`HardwareError`], naming module and operation

pub mod error;
pub mod hal;
pub mod mock;
pub mod programmer;

pub use error::{HardwareError, ModuleId, Result};
pub use hal::{
    ClockSource, DigitizerCrate, HelicityDecoder, ModuleSet, TriggerInterface, TriggerSource,
};
pub use programmer::program;
