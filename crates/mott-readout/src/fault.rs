//! Per-event readout faults.
//!
//! None of these stop the run. Each one is logged where it happens and kept
//! in the [`AssembledEvent`](crate::AssembledEvent) so the event can be
//! flagged offline.

use mott_hardware::ModuleId;
use thiserror::Error;

/// Something that went wrong while reading one event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyFault {
    /// The TI returned no trigger block.
    #[error("Event {event_number}: No TI Trigger data or error ({detail})")]
    NoTriggerData {
        /// Event number.
        event_number: u32,
        /// Word count or error text.
        detail: String,
    },

    /// A module never reported a block ready.
    #[error("Event {event_number}: TIMEOUT waiting for {module} Block Ready ({attempts} polls)")]
    Timeout {
        /// Module polled.
        module: ModuleId,
        /// Event number.
        event_number: u32,
        /// Polls taken.
        attempts: u32,
    },

    /// A block read failed or returned nothing.
    #[error("Event {event_number}: ERROR or NO data from {module} block read ({detail})")]
    ReadError {
        /// Module read.
        module: ModuleId,
        /// Event number.
        event_number: u32,
        /// Word count or error text.
        detail: String,
    },

    /// Not every active digitizer reported ready.
    #[error("Event {event_number}: fADC250 ready mask {actual:#x}, expected {expected:#x}")]
    ReadyMaskMismatch {
        /// Event number.
        event_number: u32,
        /// OR of the active slots.
        expected: u32,
        /// Last mask read.
        actual: u32,
    },

    /// A digitizer flagged its block transfer as bad.
    #[error("ERROR: Slot {slot}: in transfer (event = {event_number}), words = {words:#x}")]
    BlockTransferError {
        /// Digitizer slot.
        slot: u32,
        /// Event number.
        event_number: u32,
        /// Words the transfer returned (kept in the event).
        words: usize,
    },

    /// A module still had data after readout of a sync event.
    #[error("Event {event_number}: {module} Data available ({available}) after readout in SYNC event")]
    ResidualData {
        /// Module with leftover data.
        module: ModuleId,
        /// Event number.
        event_number: u32,
        /// Blocks available before flushing.
        available: u32,
        /// Flushes issued.
        flushes: u32,
    },

    /// Flushing gave up before the module reported empty.
    #[error("Event {event_number}: {module} still has {remaining} blocks after {attempts} flushes")]
    FlushIncomplete {
        /// Module being flushed.
        module: ModuleId,
        /// Event number.
        event_number: u32,
        /// Blocks still available.
        remaining: u32,
        /// Flushes issued.
        attempts: u32,
    },

    /// The event buffer had no room for a bank.
    #[error("Event {event_number}: no room for {module} bank ({remaining} words left)")]
    BufferFull {
        /// Module whose bank did not fit.
        module: ModuleId,
        /// Event number.
        event_number: u32,
        /// Words left in the buffer.
        remaining: usize,
    },
}

impl AssemblyFault {
    /// Module the fault is about.
    pub fn module(&self) -> ModuleId {
        match self {
            Self::NoTriggerData { .. } => ModuleId::TriggerInterface,
            Self::ReadyMaskMismatch { .. } => ModuleId::Digitizer(0),
            Self::BlockTransferError { slot, .. } => ModuleId::Digitizer(*slot),
            Self::Timeout { module, .. }
            | Self::ReadError { module, .. }
            | Self::ResidualData { module, .. }
            | Self::FlushIncomplete { module, .. }
            | Self::BufferFull { module, .. } => *module,
        }
    }

    /// Event the fault was raised in.
    pub fn event_number(&self) -> u32 {
        match self {
            Self::NoTriggerData { event_number, .. }
            | Self::Timeout { event_number, .. }
            | Self::ReadError { event_number, .. }
            | Self::ReadyMaskMismatch { event_number, .. }
            | Self::BlockTransferError { event_number, .. }
            | Self::ResidualData { event_number, .. }
            | Self::FlushIncomplete { event_number, .. }
            | Self::BufferFull { event_number, .. } => *event_number,
        }
    }

    /// Variant name, for counting faults by kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoTriggerData { .. } => "NoTriggerData",
            Self::Timeout { .. } => "Timeout",
            Self::ReadError { .. } => "ReadError",
            Self::ReadyMaskMismatch { .. } => "ReadyMaskMismatch",
            Self::BlockTransferError { .. } => "BlockTransferError",
            Self::ResidualData { .. } => "ResidualData",
            Self::FlushIncomplete { .. } => "FlushIncomplete",
            Self::BufferFull { .. } => "BufferFull",
        }
    }

    /// True for faults raised by the sync-event sweep.
    pub fn is_sync_fault(&self) -> bool {
        matches!(
            self,
            Self::ResidualData { .. } | Self::FlushIncomplete { .. }
        )
    }
}

/// What happened to one module during one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceReadState {
    /// Module read.
    pub source: ModuleId,
    /// A read was issued.
    pub attempted: bool,
    /// Words appended to the event.
    pub words_read: usize,
    /// The module flagged a block error.
    pub block_error: bool,
    /// The ready poll expired.
    pub timed_out: bool,
}

impl SourceReadState {
    /// Fresh state for `source`.
    pub fn new(source: ModuleId) -> Self {
        Self {
            source,
            attempted: false,
            words_read: 0,
            block_error: false,
            timed_out: false,
        }
    }

    /// Read attempted, data appended, nothing flagged.
    pub fn is_clean(&self) -> bool {
        self.attempted && self.words_read > 0 && !self.block_error && !self.timed_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let f = AssemblyFault::BlockTransferError {
            slot: 5,
            event_number: 42,
            words: 0x20,
        };
        assert_eq!(f.to_string(), "ERROR: Slot 5: in transfer (event = 42), words = 0x20");
        assert_eq!(f.module(), ModuleId::Digitizer(5));
        assert_eq!(f.event_number(), 42);

        let f = AssemblyFault::ResidualData {
            module: ModuleId::HelicityDecoder,
            event_number: 7,
            available: 3,
            flushes: 3,
        };
        assert_eq!(
            f.to_string(),
            "Event 7: Helicity Decoder Data available (3) after readout in SYNC event"
        );
        assert!(f.is_sync_fault());
    }

    #[test]
    fn test_clean_state() {
        let mut s = SourceReadState::new(ModuleId::TriggerInterface);
        assert!(!s.is_clean());
        s.attempted = true;
        s.words_read = 4;
        assert!(s.is_clean());
        s.timed_out = true;
        assert!(!s.is_clean());
    }
}
