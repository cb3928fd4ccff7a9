//! Simulated trigger interface.

use super::{CallLog, MockPort, ReadBehavior, Residual};
use crate::error::{HardwareError, ModuleId, Result};
use crate::hal::{TriggerInterface, TriggerSource};
use tracing::debug;

/// Bank tag of the TI trigger bank.
pub const TRIGGER_BANK_TAG: u32 = 0xFF11;

const MODULE: ModuleId = ModuleId::TriggerInterface;

/// In-memory TI master.
///
/// Every `read_trigger_block` delivers one trigger: a four-word bank holding
/// the event number and a timestamp.
#[derive(Debug)]
pub struct MockTriggerInterface {
    port: MockPort,
    address: Option<u32>,
    source: Option<TriggerSource>,
    block_level: u32,
    interrupts_enabled: bool,
    pulsers: (bool, bool),
    events: u32,
    sync_every: Option<u32>,
    last_sync: bool,
    read: ReadBehavior,
    residual: Residual,
}

impl MockTriggerInterface {
    /// New module logging into `log`.
    pub fn new(log: CallLog) -> Self {
        Self {
            port: MockPort::new(log, "ti"),
            address: None,
            source: None,
            block_level: 1,
            interrupts_enabled: false,
            pulsers: (false, false),
            events: 0,
            sync_every: None,
            last_sync: false,
            read: ReadBehavior::Data,
            residual: Residual::default(),
        }
    }

    /// Flag every `n`-th event as a sync event.
    pub fn set_sync_every(&mut self, n: Option<u32>) {
        self.sync_every = n.filter(|n| *n > 0);
    }

    /// What the next trigger block reads return.
    pub fn set_read_behavior(&mut self, read: ReadBehavior) {
        self.read = read;
    }

    /// Leave `available` blocks behind; `sticky` blocks survive flushing.
    pub fn set_residual(&mut self, available: u32, sticky: bool) {
        self.residual = Residual { available, sticky };
    }

    /// Make `operation` fail from now on.
    pub fn fail_operation(&mut self, operation: &'static str) {
        self.port.fail(operation);
    }

    /// Selected trigger source.
    pub fn trigger_source(&self) -> Option<TriggerSource> {
        self.source
    }

    /// Current block level.
    pub fn block_level(&self) -> u32 {
        self.block_level
    }

    /// `(random, fixed)` pulser state.
    pub fn pulsers_running(&self) -> (bool, bool) {
        self.pulsers
    }

    fn require_init(&self, operation: &'static str) -> Result<()> {
        match self.address {
            Some(_) => Ok(()),
            None => Err(HardwareError::NotInitialized {
                module: MODULE,
                operation,
            }),
        }
    }
}

impl TriggerInterface for MockTriggerInterface {
    fn init(&mut self, address: u32) -> Result<()> {
        self.port.call(MODULE, "init", &[address])?;
        self.address = Some(address);
        self.events = 0;
        Ok(())
    }

    fn load_trigger_table(&mut self) -> Result<()> {
        self.port.call(MODULE, "load_trigger_table", &[])?;
        self.require_init("load_trigger_table")
    }

    fn set_trigger_source(&mut self, source: TriggerSource) -> Result<()> {
        self.port.call(MODULE, "set_trigger_source", &[source.code()])?;
        self.require_init("set_trigger_source")?;
        self.source = Some(source);
        Ok(())
    }

    fn set_block_level(&mut self, level: u32) -> Result<()> {
        self.port.call(MODULE, "set_block_level", &[level])?;
        self.require_init("set_block_level")?;
        if level == 0 || level > 255 {
            return Err(HardwareError::Rejected {
                module: MODULE,
                operation: "set_block_level",
                reason: format!("block level {level} outside 1..=255"),
            });
        }
        self.block_level = level;
        Ok(())
    }

    fn set_block_buffer_level(&mut self, level: u32) -> Result<()> {
        self.port.call(MODULE, "set_block_buffer_level", &[level])
    }

    fn set_prescale(&mut self, prescale: u32) -> Result<()> {
        self.port.call(MODULE, "set_prescale", &[prescale])
    }

    fn set_trigger_holdoff(&mut self, rule: u32, period: u32, timestep: u32) -> Result<()> {
        self.port
            .call(MODULE, "set_trigger_holdoff", &[rule, period, timestep])?;
        if !(1..=4).contains(&rule) {
            return Err(HardwareError::Rejected {
                module: MODULE,
                operation: "set_trigger_holdoff",
                reason: format!("rule {rule} outside 1..=4"),
            });
        }
        Ok(())
    }

    fn set_random_pulser(&mut self, prescale: u32) -> Result<()> {
        self.port.call(MODULE, "set_random_pulser", &[prescale])
    }

    fn set_fixed_pulser(&mut self, nevents: u32, period: u32, timestep: u32) -> Result<()> {
        self.port
            .call(MODULE, "set_fixed_pulser", &[nevents, period, timestep])
    }

    fn start_pulsers(&mut self, random: bool, fixed: bool) -> Result<()> {
        self.port
            .call(MODULE, "start_pulsers", &[u32::from(random), u32::from(fixed)])?;
        self.pulsers = (random, fixed);
        Ok(())
    }

    fn stop_pulsers(&mut self) -> Result<()> {
        self.port.call(MODULE, "stop_pulsers", &[])?;
        self.pulsers = (false, false);
        Ok(())
    }

    fn enable_interrupts(&mut self) -> Result<()> {
        self.port.call(MODULE, "enable_interrupts", &[])?;
        self.interrupts_enabled = true;
        Ok(())
    }

    fn interrupt_count(&self) -> u32 {
        self.events
    }

    fn read_trigger_block(&mut self, dest: &mut [u32]) -> Result<usize> {
        self.events = self.events.wrapping_add(1);
        self.last_sync = self
            .sync_every
            .is_some_and(|n| self.events % n == 0);

        match self.read {
            ReadBehavior::Empty => return Ok(0),
            ReadBehavior::BusError => {
                return Err(HardwareError::Bus {
                    module: MODULE,
                    operation: "read_trigger_block",
                })
            }
            ReadBehavior::Data => {}
        }

        let block = [
            3,
            (TRIGGER_BANK_TAG << 16) | (0x01 << 8) | (self.block_level & 0xFF),
            self.events,
            self.events.wrapping_mul(250),
        ];
        if dest.len() < block.len() {
            return Err(HardwareError::Rejected {
                module: MODULE,
                operation: "read_trigger_block",
                reason: format!("destination holds {} words, need {}", dest.len(), block.len()),
            });
        }
        dest[..block.len()].copy_from_slice(&block);
        Ok(block.len())
    }

    fn sync_event_flag(&self) -> bool {
        self.last_sync
    }

    fn residual(&mut self) -> u32 {
        self.residual.available
    }

    fn flush(&mut self) -> Result<()> {
        self.port.call(MODULE, "flush", &[])?;
        self.residual.flush();
        debug!(left = self.residual.available, "TI flush");
        Ok(())
    }

    fn status(&self) -> String {
        format!(
            "TI addr={:#x} source={} blocklevel={} interrupts={} events={}",
            self.address.unwrap_or(0),
            self.source
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unset".into()),
            self.block_level,
            if self.interrupts_enabled { "on" } else { "off" },
            self.events
        )
    }
}
