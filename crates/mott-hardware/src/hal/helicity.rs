//! Helicity decoder operations.

use crate::error::Result;
use mott_core::config::InternalHelicityConfig;

/// The helicity decoder board.
pub trait HelicityDecoder {
    /// Attach to the module at `address` in `slot`.
    fn init(&mut self, address: u32, slot: u32) -> Result<()>;

    /// Input and trigger-latency processing delays.
    fn set_processing_delays(&mut self, input_delay: u32, trigger_latency_delay: u32)
        -> Result<()>;

    /// Turn on helicity decoding.
    fn enable_decoder(&mut self) -> Result<()>;

    /// Program the internal helicity generator.
    fn set_internal_helicity(&mut self, params: &InternalHelicityConfig) -> Result<()>;

    /// Use the internal generator instead of the external input.
    fn enable_internal_helicity(&mut self) -> Result<()>;

    /// Accept triggers.
    fn enable(&mut self) -> Result<()>;

    /// Stop accepting triggers.
    fn disable(&mut self) -> Result<()>;

    /// True when a block is ready for readout.
    fn block_ready(&mut self) -> bool;

    /// Copy one block into `dest`; returns words written.
    fn read_block(&mut self, dest: &mut [u32]) -> Result<usize>;

    /// Blocks still available.
    fn residual(&mut self) -> u32;

    /// Discard one block.
    fn flush(&mut self) -> Result<()>;

    /// One-line status summary.
    fn status(&self) -> String;
}
