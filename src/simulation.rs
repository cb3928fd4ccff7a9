//! Readout against the simulated crate.
//!
//! Builds a [`ReadoutController`] over the mock modules from
//! [`SimulationSettings`], and keeps running totals of what a run produced.

use crate::settings::{RocSettings, SimulationSettings};
use mott_hardware::mock::{CallLog, MockDigitizerCrate, MockHelicityDecoder, MockTriggerInterface};
use mott_hardware::ModuleSet;
use mott_readout::{AssembledEvent, EventAssembler, ReadoutController};
use serde::Serialize;
use std::collections::BTreeMap;

/// Controller over the simulated crate.
pub type MockController =
    ReadoutController<MockTriggerInterface, MockHelicityDecoder, MockDigitizerCrate>;

/// Simulated modules configured from `sim`, sharing one call log.
pub fn mock_modules(
    sim: &SimulationSettings,
) -> ModuleSet<MockTriggerInterface, MockHelicityDecoder, MockDigitizerCrate> {
    let log = CallLog::new();
    let mut ti = MockTriggerInterface::new(log.clone());
    ti.set_sync_every((sim.sync_every > 0).then_some(sim.sync_every));

    let mut fadc = MockDigitizerCrate::with_seed(log.clone(), sim.seed);
    fadc.set_samples(sim.samples);
    fadc.set_error_rate(sim.error_rate);

    ModuleSet::new(ti, MockHelicityDecoder::new(log), fadc)
}

/// Controller over the simulated crate, sized and tagged from `settings`.
pub fn mock_controller(settings: &RocSettings) -> MockController {
    let assembler = EventAssembler::new().with_capacity(settings.event_capacity_words);
    ReadoutController::new(mock_modules(&settings.simulation))
        .with_assembler(assembler)
        .with_roc_id(settings.roc_id)
}

/// Running totals over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Events assembled.
    pub events: u64,
    /// Bytes handed off.
    pub bytes: u64,
    /// Events flagged as sync events.
    pub sync_events: u64,
    /// Events with at least one fault.
    pub faulted_events: u64,
    /// Fault count per fault kind.
    pub faults: BTreeMap<String, u64>,
}

impl RunSummary {
    /// Add one event.
    pub fn record(&mut self, event: &AssembledEvent) {
        self.events += 1;
        self.bytes += event.to_bytes().len() as u64;
        if event.sync_event {
            self.sync_events += 1;
        }
        if !event.is_clean() {
            self.faulted_events += 1;
        }
        for fault in &event.faults {
            *self.faults.entry(fault.kind().to_string()).or_default() += 1;
        }
    }
}
