//! Simulated fADC250 crate.

use super::{CallLog, MockPort, MockRng, ReadBehavior, Readiness, ReadyScript, Residual};
use crate::error::{HardwareError, ModuleId, Result};
use crate::hal::{ClockSource, DigitizerCrate};
use mott_core::config::{DigitizerType, ProcessingParams, FADC_CHANNELS};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Highest VME slot.
const MAX_SLOT: u32 = 21;

/// Register state of one simulated fADC250.
#[derive(Debug, Clone, Default)]
pub struct MockFadc {
    /// A24 address given at init.
    pub address: u32,
    /// Init flags.
    pub init_arg: u32,
    /// SD front-panel address.
    pub sd_fp_address: u32,
    /// Clock source.
    pub clock: Option<ClockSource>,
    /// Per-channel DAC.
    pub dac: [u32; FADC_CHANNELS],
    /// Per-channel threshold.
    pub threshold: [u32; FADC_CHANNELS],
    /// Processing mode.
    pub processing: ProcessingParams,
    /// `(channel, delay)` writes in order.
    pub delays: Vec<(u32, u32)>,
    /// Accepting triggers.
    pub enabled: bool,
    /// Blocks read out.
    pub blocks: u32,
    ready: ReadyScript,
    read: ReadBehavior,
    residual: Residual,
    transfer_error: bool,
}

/// In-memory crate of fADC250 modules, keyed by slot.
///
/// A block is a header word, `samples` ADC words and a trailer word.
#[derive(Debug)]
pub struct MockDigitizerCrate {
    port: MockPort,
    modules: BTreeMap<u32, MockFadc>,
    rng: MockRng,
    samples: usize,
    error_rate: f64,
    last_error: bool,
    sync_source: bool,
    sync_resets: Vec<DigitizerType>,
}

impl MockDigitizerCrate {
    /// New crate logging into `log`, with a fixed payload seed.
    pub fn new(log: CallLog) -> Self {
        Self::with_seed(log, Some(0x5EED))
    }

    /// New crate with the given payload seed (`None` for OS entropy).
    pub fn with_seed(log: CallLog, seed: Option<u64>) -> Self {
        Self {
            port: MockPort::new(log, "fadc"),
            modules: BTreeMap::new(),
            rng: MockRng::new(seed),
            samples: 16,
            error_rate: 0.0,
            last_error: false,
            sync_source: false,
            sync_resets: Vec::new(),
        }
    }

    /// ADC words per block, between header and trailer.
    pub fn set_samples(&mut self, samples: usize) {
        self.samples = samples;
    }

    /// Probability of a random block-transfer error on each read.
    pub fn set_error_rate(&mut self, rate: f64) {
        self.error_rate = rate;
    }

    /// When blocks in `slot` become ready. Creates the slot if needed.
    pub fn set_readiness(&mut self, slot: u32, mode: Readiness) {
        self.modules.entry(slot).or_default().ready = ReadyScript {
            mode,
            ..Default::default()
        };
    }

    /// What block reads from `slot` return.
    pub fn set_read_behavior(&mut self, slot: u32, read: ReadBehavior) {
        self.modules.entry(slot).or_default().read = read;
    }

    /// Every transfer from `slot` ends in a block error.
    pub fn set_transfer_error(&mut self, slot: u32, on: bool) {
        self.modules.entry(slot).or_default().transfer_error = on;
    }

    /// Leave `available` blocks behind in `slot`.
    pub fn set_residual(&mut self, slot: u32, available: u32, sticky: bool) {
        self.modules.entry(slot).or_default().residual = Residual { available, sticky };
    }

    /// Make `operation` fail from now on.
    pub fn fail_operation(&mut self, operation: &'static str) {
        self.port.fail(operation);
    }

    /// Register state of `slot`.
    pub fn module(&self, slot: u32) -> Option<&MockFadc> {
        self.modules.get(&slot)
    }

    /// Whether sync resets are taken from the SD.
    pub fn sync_source_enabled(&self) -> bool {
        self.sync_source
    }

    /// Sync resets issued so far.
    pub fn sync_resets(&self) -> &[DigitizerType] {
        &self.sync_resets
    }

    fn module_mut(&mut self, slot: u32, operation: &'static str) -> Result<&mut MockFadc> {
        self.modules
            .get_mut(&slot)
            .filter(|m| m.address != 0)
            .ok_or(HardwareError::NotInitialized {
                module: ModuleId::Digitizer(slot),
                operation,
            })
    }

    fn check_channel(slot: u32, channel: u32, operation: &'static str) -> Result<usize> {
        usize::try_from(channel)
            .ok()
            .filter(|c| *c < FADC_CHANNELS)
            .ok_or_else(|| HardwareError::Rejected {
                module: ModuleId::Digitizer(slot),
                operation,
                reason: format!("channel {channel} out of range"),
            })
    }
}

impl DigitizerCrate for MockDigitizerCrate {
    fn init(&mut self, slot: u32, address: u32, init_arg: u32) -> Result<()> {
        let module = ModuleId::Digitizer(slot);
        self.port.call(module, "init", &[slot, address, init_arg])?;
        if slot == 0 || slot > MAX_SLOT || address == 0 {
            return Err(HardwareError::NotFound { module, address });
        }
        let m = self.modules.entry(slot).or_default();
        m.address = address;
        m.init_arg = init_arg;
        debug!(slot, address, "Mock fADC250 initialized");
        Ok(())
    }

    fn set_sd_fp_address(&mut self, slot: u32, fp_address: u32) -> Result<()> {
        self.port
            .call(ModuleId::Digitizer(slot), "set_sd_fp_address", &[slot, fp_address])?;
        self.module_mut(slot, "set_sd_fp_address")?.sd_fp_address = fp_address;
        Ok(())
    }

    fn set_clock_source(&mut self, slot: u32, source: ClockSource) -> Result<()> {
        let code = match source {
            ClockSource::Internal => 0,
            ClockSource::FrontPanel => 1,
            ClockSource::Vxs => 2,
        };
        self.port
            .call(ModuleId::Digitizer(slot), "set_clock_source", &[slot, code])?;
        self.module_mut(slot, "set_clock_source")?.clock = Some(source);
        Ok(())
    }

    fn reset_counters(&mut self, slot: u32) -> Result<()> {
        self.port
            .call(ModuleId::Digitizer(slot), "reset_counters", &[slot])?;
        self.module_mut(slot, "reset_counters")?.blocks = 0;
        Ok(())
    }

    fn enable_bus_error(&mut self, slot: u32) -> Result<()> {
        self.port
            .call(ModuleId::Digitizer(slot), "enable_bus_error", &[slot])?;
        self.module_mut(slot, "enable_bus_error").map(|_| ())
    }

    fn set_dac(&mut self, slot: u32, channel: u32, value: u32) -> Result<()> {
        self.port
            .call(ModuleId::Digitizer(slot), "set_dac", &[slot, channel, value])?;
        let ch = Self::check_channel(slot, channel, "set_dac")?;
        self.module_mut(slot, "set_dac")?.dac[ch] = value;
        Ok(())
    }

    fn set_threshold(&mut self, slot: u32, channel: u32, value: u32) -> Result<()> {
        self.port
            .call(ModuleId::Digitizer(slot), "set_threshold", &[slot, channel, value])?;
        let ch = Self::check_channel(slot, channel, "set_threshold")?;
        self.module_mut(slot, "set_threshold")?.threshold[ch] = value;
        Ok(())
    }

    fn set_processing_mode(&mut self, slot: u32, params: &ProcessingParams) -> Result<()> {
        self.port.call(
            ModuleId::Digitizer(slot),
            "set_processing_mode",
            &[slot, params.mode, params.pl, params.ptw, params.nsb, params.nsa, params.np],
        )?;
        self.module_mut(slot, "set_processing_mode")?.processing = *params;
        Ok(())
    }

    fn set_channel_delay(&mut self, slot: u32, channel: u32, delay: u32) -> Result<()> {
        self.port
            .call(ModuleId::Digitizer(slot), "set_channel_delay", &[slot, channel, delay])?;
        Self::check_channel(slot, channel, "set_channel_delay")?;
        self.module_mut(slot, "set_channel_delay")?
            .delays
            .push((channel, delay));
        Ok(())
    }

    fn enable_sync_source(&mut self) -> Result<()> {
        self.port
            .call(ModuleId::Digitizer(0), "enable_sync_source", &[])?;
        self.sync_source = true;
        Ok(())
    }

    fn sync_reset(&mut self, kind: DigitizerType) -> Result<()> {
        self.port.call(
            ModuleId::Digitizer(0),
            "sync_reset",
            &[kind.index() as u32],
        )?;
        self.sync_resets.push(kind);
        Ok(())
    }

    fn enable(&mut self, slot: u32) -> Result<()> {
        self.port.call(ModuleId::Digitizer(slot), "enable", &[slot])?;
        self.module_mut(slot, "enable")?.enabled = true;
        Ok(())
    }

    fn disable_all(&mut self) -> Result<()> {
        self.port
            .call(ModuleId::Digitizer(0), "disable_all", &[])?;
        for m in self.modules.values_mut() {
            m.enabled = false;
        }
        Ok(())
    }

    fn block_ready_mask(&mut self) -> u32 {
        let mut mask = 0;
        for (slot, m) in self.modules.iter_mut() {
            if m.enabled && m.ready.poll() {
                mask |= 1u32.checked_shl(*slot).unwrap_or(0);
            }
        }
        mask
    }

    fn read_block(&mut self, slot: u32, dest: &mut [u32]) -> Result<usize> {
        let samples = self.samples;
        let random_error = self.rng.should_fail(self.error_rate);
        let m = self
            .modules
            .get_mut(&slot)
            .filter(|m| m.address != 0)
            .ok_or(HardwareError::NotInitialized {
                module: ModuleId::Digitizer(slot),
                operation: "read_block",
            })?;
        m.ready.rearm();

        match m.read {
            ReadBehavior::Empty => return Ok(0),
            ReadBehavior::BusError => {
                self.last_error = true;
                return Err(HardwareError::Bus {
                    module: ModuleId::Digitizer(slot),
                    operation: "read_block",
                });
            }
            ReadBehavior::Data => {}
        }

        m.blocks = m.blocks.wrapping_add(1);
        let full = samples + 2;
        let mut n = full.min(dest.len());
        if m.transfer_error || random_error {
            // Transfer cut short.
            n /= 2;
            self.last_error = true;
            warn!(slot, words = n, "Simulated block transfer error");
        }

        let header = 0x8000_0000 | ((slot & 0x1F) << 22) | (m.blocks & 0x3FFFFF);
        for (i, word) in dest[..n].iter_mut().enumerate() {
            *word = if i == 0 {
                header
            } else if i == full - 1 {
                0x8800_0000 | ((slot & 0x1F) << 22) | (full as u32 & 0x3FFFFF)
            } else {
                ((i as u32 - 1) << 16) | self.rng.sample()
            };
        }
        Ok(n)
    }

    fn block_error(&mut self) -> bool {
        std::mem::take(&mut self.last_error)
    }

    fn residual(&mut self, slot: u32) -> u32 {
        self.modules
            .get(&slot)
            .map_or(0, |m| m.residual.available)
    }

    fn flush(&mut self, slot: u32) -> Result<()> {
        self.port.call(ModuleId::Digitizer(slot), "flush", &[slot])?;
        if let Some(m) = self.modules.get_mut(&slot) {
            m.residual.flush();
        }
        Ok(())
    }

    fn status(&self) -> String {
        let slots: Vec<String> = self
            .modules
            .iter()
            .filter(|(_, m)| m.address != 0)
            .map(|(slot, m)| {
                format!(
                    "{slot}:{}/{}",
                    if m.enabled { "on" } else { "off" },
                    m.blocks
                )
            })
            .collect();
        format!(
            "fADC250 x{} sync_source={} [{}]",
            slots.len(),
            self.sync_source,
            slots.join(" ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crate_with(slot: u32) -> MockDigitizerCrate {
        let mut fadc = MockDigitizerCrate::new(CallLog::new());
        fadc.init(slot, slot << 19, 0).unwrap();
        fadc.enable(slot).unwrap();
        fadc
    }

    #[test]
    fn test_ready_mask_only_enabled() {
        let mut fadc = crate_with(3);
        fadc.init(5, 5 << 19, 0).unwrap();
        assert_eq!(fadc.block_ready_mask(), 1 << 3);
        fadc.enable(5).unwrap();
        assert_eq!(fadc.block_ready_mask(), (1 << 3) | (1 << 5));
    }

    #[test]
    fn test_block_layout() {
        let mut fadc = crate_with(4);
        fadc.set_samples(6);
        let mut dest = [0u32; 64];
        let n = fadc.read_block(4, &mut dest).unwrap();
        assert_eq!(n, 8);
        assert_eq!(dest[0] >> 27, 0x10);
        assert_eq!(dest[7] >> 27, 0x11);
        assert!(!fadc.block_error());
    }

    #[test]
    fn test_transfer_error_reported_once() {
        let mut fadc = crate_with(4);
        fadc.set_transfer_error(4, true);
        let mut dest = [0u32; 64];
        let n = fadc.read_block(4, &mut dest).unwrap();
        assert_eq!(n, 9);
        assert!(fadc.block_error());
        assert!(!fadc.block_error());
    }

    #[test]
    fn test_uninitialized_slot() {
        let mut fadc = MockDigitizerCrate::new(CallLog::new());
        assert!(matches!(
            fadc.set_dac(7, 0, 1),
            Err(HardwareError::NotInitialized { .. })
        ));
        assert!(matches!(
            fadc.init(0, 0, 0),
            Err(HardwareError::NotFound { .. })
        ));
    }

    #[test]
    fn test_channel_range() {
        let mut fadc = crate_with(3);
        assert!(fadc.set_threshold(3, 15, 1).is_ok());
        assert!(fadc.set_threshold(3, 16, 1).is_err());
        assert_eq!(fadc.module(3).unwrap().threshold[15], 1);
    }

    #[test]
    fn test_payload_reproducible() {
        let mut a = crate_with(3);
        let mut b = crate_with(3);
        let mut da = [0u32; 32];
        let mut db = [0u32; 32];
        a.read_block(3, &mut da).unwrap();
        b.read_block(3, &mut db).unwrap();
        assert_eq!(da, db);
    }
}
