//! fADC250 group operations.

use crate::error::Result;
use mott_core::config::{DigitizerType, ProcessingParams};

/// Where a digitizer takes its sampling clock from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSource {
    /// On-board oscillator.
    Internal,
    /// Front-panel input.
    FrontPanel,
    /// Backplane, distributed by the signal distribution board.
    Vxs,
}

/// All fADC250 modules in the crate, addressed by slot.
///
/// Mirrors the vendor library: one handle, group calls (`block_ready_mask`,
/// `disable_all`) plus per-slot calls.
pub trait DigitizerCrate {
    /// Attach to the module at `address` in `slot`.
    fn init(&mut self, slot: u32, address: u32, init_arg: u32) -> Result<()>;

    /// Front-panel address on the signal distribution board.
    fn set_sd_fp_address(&mut self, slot: u32, fp_address: u32) -> Result<()>;

    /// Sampling clock.
    fn set_clock_source(&mut self, slot: u32, source: ClockSource) -> Result<()>;

    /// Clear trigger and event counters.
    fn reset_counters(&mut self, slot: u32) -> Result<()>;

    /// Terminate block transfers with a bus error.
    fn enable_bus_error(&mut self, slot: u32) -> Result<()>;

    /// Pedestal DAC of one channel.
    fn set_dac(&mut self, slot: u32, channel: u32, value: u32) -> Result<()>;

    /// Readout threshold of one channel.
    fn set_threshold(&mut self, slot: u32, channel: u32, value: u32) -> Result<()>;

    /// Pulse processing mode and window.
    fn set_processing_mode(&mut self, slot: u32, params: &ProcessingParams) -> Result<()>;

    /// Input delay of one channel.
    fn set_channel_delay(&mut self, slot: u32, channel: u32, delay: u32) -> Result<()>;

    /// Take sync resets from the signal distribution board.
    fn enable_sync_source(&mut self) -> Result<()>;

    /// Issue the sync reset for the digitizer of the given type.
    fn sync_reset(&mut self, kind: DigitizerType) -> Result<()>;

    /// Start accepting triggers in `slot`.
    fn enable(&mut self, slot: u32) -> Result<()>;

    /// Stop every module.
    fn disable_all(&mut self) -> Result<()>;

    /// Bit `slot` set for every module with a block ready.
    fn block_ready_mask(&mut self) -> u32;

    /// Copy one block from `slot` into `dest`; returns words written.
    fn read_block(&mut self, slot: u32, dest: &mut [u32]) -> Result<usize>;

    /// Whether the last transfer ended in error. Reading clears it.
    fn block_error(&mut self) -> bool;

    /// Blocks still available in `slot`.
    fn residual(&mut self, slot: u32) -> u32;

    /// Discard one block from `slot`.
    fn flush(&mut self, slot: u32) -> Result<()>;

    /// One-line status summary.
    fn status(&self) -> String;
}
