//! Simulated helicity decoder.

use super::{CallLog, MockPort, ReadBehavior, Readiness, ReadyScript, Residual};
use crate::error::{HardwareError, ModuleId, Result};
use crate::hal::HelicityDecoder;
use mott_core::config::InternalHelicityConfig;

const MODULE: ModuleId = ModuleId::HelicityDecoder;

/// In-memory helicity decoder.
#[derive(Debug)]
pub struct MockHelicityDecoder {
    port: MockPort,
    slot: Option<u32>,
    enabled: bool,
    internal: Option<InternalHelicityConfig>,
    ready: ReadyScript,
    read: ReadBehavior,
    block_words: usize,
    blocks: u32,
    residual: Residual,
}

impl MockHelicityDecoder {
    /// New module logging into `log`. Blocks are 4 words.
    pub fn new(log: CallLog) -> Self {
        Self {
            port: MockPort::new(log, "hd"),
            slot: None,
            enabled: false,
            internal: None,
            ready: ReadyScript::default(),
            read: ReadBehavior::Data,
            block_words: 4,
            blocks: 0,
            residual: Residual::default(),
        }
    }

    /// When the next blocks become ready.
    pub fn set_readiness(&mut self, mode: Readiness) {
        self.ready = ReadyScript {
            mode,
            ..Default::default()
        };
    }

    /// What block reads return.
    pub fn set_read_behavior(&mut self, read: ReadBehavior) {
        self.read = read;
    }

    /// Words per block, header included.
    pub fn set_block_words(&mut self, words: usize) {
        self.block_words = words.max(1);
    }

    /// Leave `available` blocks behind; `sticky` blocks survive flushing.
    pub fn set_residual(&mut self, available: u32, sticky: bool) {
        self.residual = Residual { available, sticky };
    }

    /// Make `operation` fail from now on.
    pub fn fail_operation(&mut self, operation: &'static str) {
        self.port.fail(operation);
    }

    /// Whether the decoder is accepting triggers.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Internal generator settings, if they were programmed.
    pub fn internal_helicity(&self) -> Option<&InternalHelicityConfig> {
        self.internal.as_ref()
    }
}

impl HelicityDecoder for MockHelicityDecoder {
    fn init(&mut self, address: u32, slot: u32) -> Result<()> {
        self.port.call(MODULE, "init", &[address, slot])?;
        self.slot = Some(slot);
        Ok(())
    }

    fn set_processing_delays(
        &mut self,
        input_delay: u32,
        trigger_latency_delay: u32,
    ) -> Result<()> {
        self.port.call(
            MODULE,
            "set_processing_delays",
            &[input_delay, trigger_latency_delay],
        )
    }

    fn enable_decoder(&mut self) -> Result<()> {
        self.port.call(MODULE, "enable_decoder", &[])
    }

    fn set_internal_helicity(&mut self, params: &InternalHelicityConfig) -> Result<()> {
        self.port.call(
            MODULE,
            "set_internal_helicity",
            &[
                params.helicity_pattern,
                params.window_delay,
                params.settle_time,
                params.stable_time,
                params.seed,
            ],
        )?;
        self.internal = Some(*params);
        Ok(())
    }

    fn enable_internal_helicity(&mut self) -> Result<()> {
        self.port.call(MODULE, "enable_internal_helicity", &[])
    }

    fn enable(&mut self) -> Result<()> {
        self.port.call(MODULE, "enable", &[])?;
        self.enabled = true;
        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        self.port.call(MODULE, "disable", &[])?;
        self.enabled = false;
        Ok(())
    }

    fn block_ready(&mut self) -> bool {
        self.ready.poll()
    }

    fn read_block(&mut self, dest: &mut [u32]) -> Result<usize> {
        self.ready.rearm();
        match self.read {
            ReadBehavior::Empty => return Ok(0),
            ReadBehavior::BusError => {
                return Err(HardwareError::Bus {
                    module: MODULE,
                    operation: "read_block",
                })
            }
            ReadBehavior::Data => {}
        }

        self.blocks = self.blocks.wrapping_add(1);
        let n = self.block_words.min(dest.len());
        let slot = self.slot.unwrap_or(0);
        for (i, word) in dest[..n].iter_mut().enumerate() {
            *word = if i == 0 {
                // Block header: type bit, slot, block number.
                0x8000_0000 | ((slot & 0x1F) << 22) | (self.blocks & 0x3FF)
            } else {
                // Alternating helicity pattern bits.
                (self.blocks + i as u32) & 0x1
            };
        }
        Ok(n)
    }

    fn residual(&mut self) -> u32 {
        self.residual.available
    }

    fn flush(&mut self) -> Result<()> {
        self.port.call(MODULE, "flush", &[])?;
        self.residual.flush();
        Ok(())
    }

    fn status(&self) -> String {
        format!(
            "HD slot={} enabled={} internal_helicity={} blocks={}",
            self.slot.unwrap_or(0),
            self.enabled,
            self.internal.is_some(),
            self.blocks
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_capped_by_destination() {
        let mut hd = MockHelicityDecoder::new(CallLog::new());
        hd.set_block_words(10);
        let mut dest = [0u32; 6];
        assert_eq!(hd.read_block(&mut dest).unwrap(), 6);
        assert_eq!(dest[0] >> 31, 1);
    }

    #[test]
    fn test_readiness_rearms_after_read() {
        let mut hd = MockHelicityDecoder::new(CallLog::new());
        hd.set_readiness(Readiness::AfterPolls(1));
        assert!(!hd.block_ready());
        assert!(hd.block_ready());
        let mut dest = [0u32; 4];
        hd.read_block(&mut dest).unwrap();
        assert!(!hd.block_ready());
    }

    #[test]
    fn test_flush_drains_residual() {
        let log = CallLog::new();
        let mut hd = MockHelicityDecoder::new(log.clone());
        hd.set_residual(2, false);
        hd.flush().unwrap();
        hd.flush().unwrap();
        assert_eq!(hd.residual(), 0);
        assert_eq!(log.count("hd.flush"), 2);
    }
}
