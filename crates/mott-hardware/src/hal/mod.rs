//! Hardware abstraction layer for the readout crate.
//!
//! One trait per module family. The readout code is written against these
//! traits only; [`crate::mock`] implements them in memory, a VME backend
//! implements them over the bus.
//!
//! # Traits
//!
//! - [`TriggerInterface`]: trigger source, block level, holdoff rules,
//!   pulsers, trigger block readout
//! - [`HelicityDecoder`]: decoder setup and block readout
//! - [`DigitizerCrate`]: group operations over the fADC250 slots
//!
//! All operations are synchronous. Readout polls; nothing here blocks.

mod digitizer;
mod helicity;
mod trigger;

pub use digitizer::{ClockSource, DigitizerCrate};
pub use helicity::HelicityDecoder;
pub use trigger::{TriggerInterface, TriggerSource};

/// The modules one readout controller drives.
#[derive(Debug)]
pub struct ModuleSet<T, H, D> {
    /// Trigger interface.
    pub ti: T,
    /// Helicity decoder.
    pub hd: H,
    /// fADC250 modules.
    pub fadc: D,
}

impl<T, H, D> ModuleSet<T, H, D>
where
    T: TriggerInterface,
    H: HelicityDecoder,
    D: DigitizerCrate,
{
    /// Bundle the three module handles.
    pub fn new(ti: T, hd: H, fadc: D) -> Self {
        Self { ti, hd, fadc }
    }
}
