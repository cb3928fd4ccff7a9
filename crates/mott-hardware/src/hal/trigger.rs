//! Trigger interface operations.

use crate::error::Result;
use std::fmt;

/// Where the TI takes its triggers from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// Front-panel "TRG" input.
    FrontPanelTrg,
    /// Front-panel "TS" inputs.
    FrontPanelTs,
    /// Internal pulsers (fixed rate and/or random).
    Pulser,
}

impl TriggerSource {
    /// Source register code.
    pub fn code(self) -> u32 {
        match self {
            Self::FrontPanelTrg => 2,
            Self::FrontPanelTs => 3,
            Self::Pulser => 5,
        }
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FrontPanelTrg => write!(f, "front panel TRG"),
            Self::FrontPanelTs => write!(f, "front panel TS inputs"),
            Self::Pulser => write!(f, "internal pulser"),
        }
    }
}

/// The TI master: owns trigger timing and hands out the trigger block that
/// opens every event.
pub trait TriggerInterface {
    /// Attach to the module at `address`.
    fn init(&mut self, address: u32) -> Result<()>;

    /// Load the default trigger table.
    fn load_trigger_table(&mut self) -> Result<()>;

    /// Select the trigger input.
    fn set_trigger_source(&mut self, source: TriggerSource) -> Result<()>;

    /// Events per block.
    fn set_block_level(&mut self, level: u32) -> Result<()>;

    /// Blocks buffered before busy is asserted.
    fn set_block_buffer_level(&mut self, level: u32) -> Result<()>;

    /// Input prescale.
    fn set_prescale(&mut self, prescale: u32) -> Result<()>;

    /// Holdoff rule `rule` (1..=4).
    fn set_trigger_holdoff(&mut self, rule: u32, period: u32, timestep: u32) -> Result<()>;

    /// Configure the random pulser rate.
    fn set_random_pulser(&mut self, prescale: u32) -> Result<()>;

    /// Configure the fixed-rate pulser.
    fn set_fixed_pulser(&mut self, nevents: u32, period: u32, timestep: u32) -> Result<()>;

    /// Start the configured pulsers.
    fn start_pulsers(&mut self, random: bool, fixed: bool) -> Result<()>;

    /// Stop both pulsers.
    fn stop_pulsers(&mut self) -> Result<()>;

    /// Start delivering triggers.
    fn enable_interrupts(&mut self) -> Result<()>;

    /// Number of triggers (blocks) delivered since the run started.
    fn interrupt_count(&self) -> u32;

    /// Copy the trigger block into `dest`; returns words written.
    ///
    /// The block is already bank-formatted.
    fn read_trigger_block(&mut self, dest: &mut [u32]) -> Result<usize>;

    /// Whether the block just read carries the sync flag.
    fn sync_event_flag(&self) -> bool;

    /// Blocks still available.
    fn residual(&mut self) -> u32;

    /// Discard one block.
    fn flush(&mut self) -> Result<()>;

    /// One-line status summary.
    fn status(&self) -> String;
}
