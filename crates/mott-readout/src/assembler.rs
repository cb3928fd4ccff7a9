//! Per-trigger event assembly.
//!
//! ```text
//! Idle -> ReadTrigger -> ReadHelicity? -> ReadDigitizer -> SyncCheck? -> Done
//! ```
//!
//! Every step records what it read in a [`SourceReadState`] and anything
//! that went wrong as an [`AssemblyFault`]. No fault ends the event early:
//! the caller always gets a buffer back, possibly with empty banks.

use crate::buffer::{BufferError, EventBuffer, DATA_TYPE_U32, DEFAULT_CAPACITY_WORDS};
use crate::fault::{AssemblyFault, SourceReadState};
use crate::poll::{poll_until, PollOutcome, MAX_POLL_ATTEMPTS};
use crate::reconcile::SyncReconciler;
use crate::run_type::RunType;
use bytes::Bytes;
use mott_core::config::{RunConfiguration, FADC_CHANNELS};
use mott_hardware::{DigitizerCrate, HelicityDecoder, ModuleId, ModuleSet, TriggerInterface};
use tracing::{debug, error, trace};

/// Bank tag of the helicity decoder data.
pub const HELICITY_DECODER_BANK: u16 = 0x11;

/// Bank tag of the fADC250 data.
pub const FADC250_BANK: u16 = 0x05;

/// Most words read from the helicity decoder per event (1024 bytes).
pub const HD_MAX_WORDS: usize = 1024 >> 2;

/// Most words of a TI trigger block per event in the block, past its
/// two-word bank header.
pub const TI_MAX_WORDS_PER_EVENT: usize = 8;

/// Most words read from one fADC250 per event in the block: 16 channels of
/// 512 raw samples plus headers.
pub const FADC250_MAX_WORDS_PER_EVENT: usize = 4 + FADC_CHANNELS * (1 + 512 / 2);

/// What the run-control layer knows about the trigger being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerContext {
    /// Event (block) number, used in fault reports.
    pub event_number: u32,
    /// Selects the trigger source and active digitizers.
    pub run_type: RunType,
}

impl TriggerContext {
    /// Context for event `event_number` of a `run_type` run.
    pub fn new(event_number: u32, run_type: RunType) -> Self {
        Self {
            event_number,
            run_type,
        }
    }
}

/// One assembled event.
#[derive(Debug, Clone)]
pub struct AssembledEvent {
    /// Event (block) number.
    pub event_number: u32,
    /// The TI flagged this as a sync event.
    pub sync_event: bool,
    /// Trigger, helicity (if enabled) and digitizer banks.
    pub buffer: EventBuffer,
    /// One entry per module read, in read order.
    pub sources: Vec<SourceReadState>,
    /// Everything that went wrong.
    pub faults: Vec<AssemblyFault>,
}

impl AssembledEvent {
    /// No faults were recorded.
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }

    /// Read state of `module`, if it was read.
    pub fn source(&self, module: ModuleId) -> Option<&SourceReadState> {
        self.sources.iter().find(|s| s.source == module)
    }

    /// The event as little-endian bytes.
    pub fn to_bytes(&self) -> Bytes {
        self.buffer.to_bytes()
    }
}

/// Builds one [`AssembledEvent`] per trigger.
#[derive(Debug, Clone, Copy)]
pub struct EventAssembler {
    capacity: usize,
    max_polls: u32,
    reconciler: SyncReconciler,
}

impl Default for EventAssembler {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY_WORDS,
            max_polls: MAX_POLL_ATTEMPTS,
            reconciler: SyncReconciler::default(),
        }
    }
}

impl EventAssembler {
    /// Assembler with default buffer capacity and poll bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Event buffer capacity in words.
    pub fn with_capacity(mut self, words: usize) -> Self {
        self.capacity = words;
        self
    }

    /// Sync-event reconciler.
    pub fn with_reconciler(mut self, reconciler: SyncReconciler) -> Self {
        self.reconciler = reconciler;
        self
    }

    /// Event buffer capacity in words.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The sync-event reconciler.
    pub fn reconciler(&self) -> &SyncReconciler {
        &self.reconciler
    }

    /// Read one trigger from every module.
    pub fn assemble<T, H, D>(
        &self,
        run: &RunConfiguration,
        ctx: &TriggerContext,
        modules: &mut ModuleSet<T, H, D>,
    ) -> AssembledEvent
    where
        T: TriggerInterface,
        H: HelicityDecoder,
        D: DigitizerCrate,
    {
        let mut event = Assembly {
            ctx: *ctx,
            block_level: (run.ti.blocklevel & 0xFF) as u8,
            buffer: EventBuffer::new(self.capacity),
            sources: Vec::with_capacity(3),
            faults: Vec::new(),
        };

        event.read_trigger(&mut modules.ti);

        if run.helicity_decoder.enabled {
            event.read_helicity(&mut modules.hd, self.max_polls);
        }

        event.read_digitizers(run, &mut modules.fadc, self.max_polls);

        let sync_event = modules.ti.sync_event_flag();
        if sync_event {
            debug!(event_number = ctx.event_number, "Sync event");
            let residual = self
                .reconciler
                .reconcile(run, ctx.run_type, ctx.event_number, modules);
            event.faults.extend(residual);
        }

        trace!(
            event_number = ctx.event_number,
            words = event.buffer.len(),
            faults = event.faults.len(),
            "Event assembled"
        );

        AssembledEvent {
            event_number: ctx.event_number,
            sync_event,
            buffer: event.buffer,
            sources: event.sources,
            faults: event.faults,
        }
    }
}

/// Working state of one assembly.
struct Assembly {
    ctx: TriggerContext,
    block_level: u8,
    buffer: EventBuffer,
    sources: Vec<SourceReadState>,
    faults: Vec<AssemblyFault>,
}

impl Assembly {
    fn fault(&mut self, fault: AssemblyFault) {
        error!(
            module = %fault.module(),
            event_number = fault.event_number(),
            "{fault}"
        );
        self.faults.push(fault);
    }

    fn events_in_block(&self) -> usize {
        usize::from(self.block_level.max(1))
    }

    fn buffer_full(&mut self, module: ModuleId, e: BufferError) {
        let remaining = match e {
            BufferError::Full { remaining, .. } => remaining,
            BufferError::BankOpen => self.buffer.remaining(),
        };
        self.fault(AssemblyFault::BufferFull {
            module,
            event_number: self.ctx.event_number,
            remaining,
        });
    }

    /// The TI block comes first and is already a bank.
    fn read_trigger<T: TriggerInterface>(&mut self, ti: &mut T) {
        let mut state = SourceReadState::new(ModuleId::TriggerInterface);
        state.attempted = true;
        let max = 2 + TI_MAX_WORDS_PER_EVENT * self.events_in_block();

        match self
            .buffer
            .append_with(max, |dest| ti.read_trigger_block(dest))
        {
            Ok(n) if n > 0 => state.words_read = n,
            Ok(n) => self.fault(AssemblyFault::NoTriggerData {
                event_number: self.ctx.event_number,
                detail: format!("dCnt = {n}"),
            }),
            Err(e) => self.fault(AssemblyFault::NoTriggerData {
                event_number: self.ctx.event_number,
                detail: e.to_string(),
            }),
        }
        self.sources.push(state);
    }

    fn read_helicity<H: HelicityDecoder>(&mut self, hd: &mut H, max_polls: u32) {
        let module = ModuleId::HelicityDecoder;
        let mut state = SourceReadState::new(module);

        if let Err(e) = self
            .buffer
            .open_bank(HELICITY_DECODER_BANK, DATA_TYPE_U32, self.block_level)
        {
            self.buffer_full(module, e);
            self.sources.push(state);
            return;
        }

        match poll_until(max_polls, || hd.block_ready(), |ready| *ready) {
            PollOutcome::Expired { attempts, .. } => {
                state.timed_out = true;
                self.fault(AssemblyFault::Timeout {
                    module,
                    event_number: self.ctx.event_number,
                    attempts,
                });
            }
            PollOutcome::Ready { .. } => {
                state.attempted = true;
                match self
                    .buffer
                    .append_with(HD_MAX_WORDS, |dest| hd.read_block(dest))
                {
                    Ok(n) if n > 0 => state.words_read = n,
                    Ok(n) => self.fault(AssemblyFault::ReadError {
                        module,
                        event_number: self.ctx.event_number,
                        detail: format!("dCnt = {n}"),
                    }),
                    Err(e) => self.fault(AssemblyFault::ReadError {
                        module,
                        event_number: self.ctx.event_number,
                        detail: e.to_string(),
                    }),
                }
            }
        }

        self.buffer.close_bank();
        self.sources.push(state);
    }

    fn read_digitizers<D: DigitizerCrate>(
        &mut self,
        run: &RunConfiguration,
        fadc: &mut D,
        max_polls: u32,
    ) {
        let active = self.ctx.run_type.active_digitizers(run);
        let expected = self.ctx.run_type.enabled_mask(run);

        if let Err(e) = self
            .buffer
            .open_bank(FADC250_BANK, DATA_TYPE_U32, self.block_level)
        {
            for d in &active {
                self.buffer_full(ModuleId::Digitizer(d.slot), e);
                self.sources.push(SourceReadState::new(ModuleId::Digitizer(d.slot)));
            }
            return;
        }

        let outcome = poll_until(
            max_polls,
            || fadc.block_ready_mask(),
            |mask| mask & expected == expected,
        );
        let ready_mask = *outcome.value();
        if !outcome.is_ready() {
            self.fault(AssemblyFault::ReadyMaskMismatch {
                event_number: self.ctx.event_number,
                expected,
                actual: ready_mask,
            });
        }

        let max = FADC250_MAX_WORDS_PER_EVENT * self.events_in_block();

        // Drain every active module, ready or not.
        for d in active {
            let slot = d.slot;
            let module = ModuleId::Digitizer(slot);
            let mut state = SourceReadState::new(module);
            state.attempted = true;
            state.timed_out = ready_mask & d.slot_mask() == 0;

            let result = self
                .buffer
                .append_with(max, |dest| fadc.read_block(slot, dest));
            state.block_error = fadc.block_error();

            match result {
                Ok(n) => {
                    state.words_read = n;
                    if state.block_error {
                        self.fault(AssemblyFault::BlockTransferError {
                            slot,
                            event_number: self.ctx.event_number,
                            words: n,
                        });
                    } else if n == 0 {
                        self.fault(AssemblyFault::ReadError {
                            module,
                            event_number: self.ctx.event_number,
                            detail: "dCnt = 0".into(),
                        });
                    }
                }
                Err(e) => self.fault(AssemblyFault::ReadError {
                    module,
                    event_number: self.ctx.event_number,
                    detail: e.to_string(),
                }),
            }
            self.sources.push(state);
        }

        self.buffer.close_bank();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BankView;
    use mott_core::config::{DigitizerConfig, DigitizerSet, DigitizerType};
    use mott_hardware::mock::{
        CallLog, MockDigitizerCrate, MockHelicityDecoder, MockTriggerInterface, ReadBehavior,
        Readiness, TRIGGER_BANK_TAG,
    };
    use tracing_test::traced_test;

    type Mocks = ModuleSet<MockTriggerInterface, MockHelicityDecoder, MockDigitizerCrate>;

    fn setup(hd_enabled: bool) -> (RunConfiguration, Mocks) {
        let mut counting = DigitizerConfig::zeroed(DigitizerType::Counting);
        counting.slot = 4;
        let mut integrating = DigitizerConfig::zeroed(DigitizerType::Integrating);
        integrating.slot = 6;
        let mut run = RunConfiguration {
            fadc250: DigitizerSet::new(counting, integrating),
            ..Default::default()
        };
        run.ti.blocklevel = 1;
        run.helicity_decoder.enabled = hd_enabled;

        let log = CallLog::new();
        let mut m = ModuleSet::new(
            MockTriggerInterface::new(log.clone()),
            MockHelicityDecoder::new(log.clone()),
            MockDigitizerCrate::new(log),
        );
        m.ti.init(3 << 19).unwrap();
        for slot in [4, 6] {
            m.fadc.init(slot, slot << 19, 0).unwrap();
            m.fadc.enable(slot).unwrap();
        }
        (run, m)
    }

    fn ctx(run_type: RunType) -> TriggerContext {
        TriggerContext::new(1, run_type)
    }

    fn tags(banks: &[BankView<'_>]) -> Vec<u16> {
        banks.iter().map(|b| b.tag).collect()
    }

    #[test]
    fn test_bank_order_with_decoder() {
        let (run, mut m) = setup(true);
        let event = EventAssembler::new().assemble(&run, &ctx(RunType::Counting), &mut m);

        assert!(event.is_clean(), "{:?}", event.faults);
        let banks = event.buffer.banks();
        assert_eq!(
            tags(&banks),
            vec![TRIGGER_BANK_TAG as u16, HELICITY_DECODER_BANK, FADC250_BANK]
        );
        assert_eq!(banks[1].num, 1);
        assert_eq!(banks[1].data.len(), 4);
        assert_eq!(banks[2].data.len(), 18);
        assert!(event.sources.iter().all(SourceReadState::is_clean));
    }

    #[test]
    fn test_no_decoder_bank_when_disabled() {
        let (run, mut m) = setup(false);
        let event = EventAssembler::new().assemble(&run, &ctx(RunType::Counting), &mut m);
        assert_eq!(
            tags(&event.buffer.banks()),
            vec![TRIGGER_BANK_TAG as u16, FADC250_BANK]
        );
        assert!(event.source(ModuleId::HelicityDecoder).is_none());
    }

    #[test]
    fn test_only_active_digitizer_read() {
        let (run, mut m) = setup(false);
        let event = EventAssembler::new().assemble(&run, &ctx(RunType::Integrating), &mut m);
        assert!(event.source(ModuleId::Digitizer(6)).is_some());
        assert!(event.source(ModuleId::Digitizer(4)).is_none());
        assert_eq!(m.fadc.module(4).unwrap().blocks, 0);
        assert_eq!(m.fadc.module(6).unwrap().blocks, 1);
    }

    #[test]
    #[traced_test]
    fn test_decoder_timeout_closes_empty_bank() {
        let (run, mut m) = setup(true);
        m.hd.set_readiness(Readiness::Never);
        let event = EventAssembler::new().assemble(&run, &ctx(RunType::Counting), &mut m);

        assert_eq!(
            event.faults,
            vec![AssemblyFault::Timeout {
                module: ModuleId::HelicityDecoder,
                event_number: 1,
                attempts: MAX_POLL_ATTEMPTS
            }]
        );
        let banks = event.buffer.banks();
        assert_eq!(banks[1].tag, HELICITY_DECODER_BANK);
        assert!(banks[1].data.is_empty());
        assert_eq!(banks[2].tag, FADC250_BANK);
        assert!(logs_contain("TIMEOUT waiting for Helicity Decoder Block Ready"));
    }

    #[test]
    fn test_decoder_ready_on_last_poll() {
        let (run, mut m) = setup(true);
        m.hd.set_readiness(Readiness::AfterPolls(MAX_POLL_ATTEMPTS - 1));
        let event = EventAssembler::new().assemble(&run, &ctx(RunType::Counting), &mut m);
        assert!(event.is_clean());

        let (run, mut m) = setup(true);
        m.hd.set_readiness(Readiness::AfterPolls(MAX_POLL_ATTEMPTS));
        let event = EventAssembler::new().assemble(&run, &ctx(RunType::Counting), &mut m);
        assert!(matches!(event.faults[0], AssemblyFault::Timeout { .. }));
    }

    #[test]
    fn test_decoder_read_error() {
        let (run, mut m) = setup(true);
        m.hd.set_read_behavior(ReadBehavior::Empty);
        let event = EventAssembler::new().assemble(&run, &ctx(RunType::Counting), &mut m);
        assert!(matches!(
            event.faults[0],
            AssemblyFault::ReadError { module: ModuleId::HelicityDecoder, .. }
        ));
        assert_eq!(event.buffer.banks()[1].data.len(), 0);
    }

    #[test]
    fn test_missing_trigger_data_continues() {
        let (run, mut m) = setup(false);
        m.ti.set_read_behavior(ReadBehavior::BusError);
        let event = EventAssembler::new().assemble(&run, &ctx(RunType::Counting), &mut m);

        assert!(matches!(event.faults[0], AssemblyFault::NoTriggerData { .. }));
        let banks = event.buffer.banks();
        assert_eq!(tags(&banks), vec![FADC250_BANK]);
        assert_eq!(banks[0].data.len(), 18);
    }

    #[test]
    fn test_digitizer_read_capped_per_event() {
        let (mut run, mut m) = setup(false);
        m.fadc.set_samples(10_000);
        let event = EventAssembler::new().assemble(&run, &ctx(RunType::Counting), &mut m);
        let state = event.source(ModuleId::Digitizer(4)).unwrap();
        assert_eq!(state.words_read, FADC250_MAX_WORDS_PER_EVENT);

        run.ti.blocklevel = 2;
        let event = EventAssembler::new().assemble(&run, &ctx(RunType::Counting), &mut m);
        let state = event.source(ModuleId::Digitizer(4)).unwrap();
        assert_eq!(state.words_read, 2 * FADC250_MAX_WORDS_PER_EVENT);
    }

    #[test]
    fn test_mask_mismatch_still_drains() {
        let (run, mut m) = setup(false);
        m.fadc.set_readiness(4, Readiness::Never);
        let event = EventAssembler::new().assemble(&run, &ctx(RunType::Counting), &mut m);

        assert_eq!(
            event.faults,
            vec![AssemblyFault::ReadyMaskMismatch {
                event_number: 1,
                expected: 1 << 4,
                actual: 1 << 6
            }]
        );
        let state = event.source(ModuleId::Digitizer(4)).unwrap();
        assert!(state.timed_out);
        assert!(state.attempted);
        assert_eq!(state.words_read, 18);
        assert_eq!(event.buffer.banks()[1].data.len(), 18);
    }

    #[test]
    fn test_block_error_keeps_partial_payload() {
        let (run, mut m) = setup(false);
        m.fadc.set_transfer_error(4, true);
        let event = EventAssembler::new().assemble(&run, &ctx(RunType::Counting), &mut m);

        assert_eq!(
            event.faults,
            vec![AssemblyFault::BlockTransferError {
                slot: 4,
                event_number: 1,
                words: 9
            }]
        );
        assert_eq!(event.buffer.banks()[1].data.len(), 9);
        assert!(event.source(ModuleId::Digitizer(4)).unwrap().block_error);
    }

    #[test]
    fn test_sync_event_flushes_without_appending() {
        let (run, mut m) = setup(false);
        m.ti.set_sync_every(Some(1));
        m.fadc.set_residual(4, 2, false);
        let event = EventAssembler::new().assemble(&run, &ctx(RunType::Counting), &mut m);

        assert!(event.sync_event);
        assert_eq!(
            event.faults,
            vec![AssemblyFault::ResidualData {
                module: ModuleId::Digitizer(4),
                event_number: 1,
                available: 2,
                flushes: 2
            }]
        );
        // Trigger bank (4 words) plus fADC bank (2 + 18).
        assert_eq!(event.buffer.len(), 24);
    }

    #[test]
    fn test_buffer_full_still_returns_event() {
        let (run, mut m) = setup(true);
        let event = EventAssembler::new()
            .with_capacity(5)
            .assemble(&run, &ctx(RunType::Counting), &mut m);

        assert!(event
            .faults
            .iter()
            .any(|f| matches!(f, AssemblyFault::BufferFull { .. })));
        assert!(!event.buffer.has_open_bank());
        assert!(event.buffer.len() <= 5);
    }
}
