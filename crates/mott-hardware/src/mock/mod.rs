//! Simulated modules for running the readout without a VME crate.
//!
//! Each mock implements one [`crate::hal`] trait in memory and can be
//! scripted per test:
//!
//! - readiness: ready immediately, after N polls, or never
//! - residual data left behind after readout, optionally impossible to flush
//! - failed reads, block-transfer errors, failing control operations
//!
//! Control operations are appended to a shared [`CallLog`] so tests can
//! assert on what was programmed, and in which order.
//!
//! ```rust,ignore
//! use mott_hardware::mock::{CallLog, MockDigitizerCrate, Readiness};
//!
//! let log = CallLog::new();
//! let mut fadc = MockDigitizerCrate::new(log.clone());
//! fadc.set_readiness(3, Readiness::AfterPolls(10));
//! ```

mod digitizer;
mod helicity;
mod rng;
mod trigger;

pub use digitizer::{MockDigitizerCrate, MockFadc};
pub use helicity::MockHelicityDecoder;
pub use rng::MockRng;
pub use trigger::{MockTriggerInterface, TRIGGER_BANK_TAG};

use crate::error::{HardwareError, ModuleId, Result};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// When a simulated module reports a block ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Readiness {
    /// On the first poll.
    #[default]
    Immediate,
    /// After this many polls have come back not ready.
    AfterPolls(u32),
    /// Never.
    Never,
}

/// Poll counter for one pending block.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ReadyScript {
    pub(crate) mode: Readiness,
    polls: u32,
}

impl ReadyScript {
    pub(crate) fn poll(&mut self) -> bool {
        self.polls = self.polls.saturating_add(1);
        match self.mode {
            Readiness::Immediate => true,
            Readiness::AfterPolls(n) => self.polls > n,
            Readiness::Never => false,
        }
    }

    /// Start waiting for the next block.
    pub(crate) fn rearm(&mut self) {
        self.polls = 0;
    }
}

/// What a simulated block read returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadBehavior {
    /// A normal block.
    #[default]
    Data,
    /// Zero words.
    Empty,
    /// A bus error.
    BusError,
}

/// Leftover blocks reported after readout.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Residual {
    pub(crate) available: u32,
    /// Flushing does not drain it.
    pub(crate) sticky: bool,
}

impl Residual {
    pub(crate) fn flush(&mut self) {
        if !self.sticky {
            self.available = self.available.saturating_sub(1);
        }
    }
}

/// One recorded control operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// `ti`, `hd` or `fadc`.
    pub module: &'static str,
    /// Operation name.
    pub operation: &'static str,
    /// Integer arguments in call order.
    pub args: Vec<u32>,
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self.args.iter().map(u32::to_string).collect();
        write!(f, "{}.{}({})", self.module, self.operation, args.join(", "))
    }
}

/// Shared, ordered record of control operations across mocks.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    /// An empty log.
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: Call) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    /// Every call so far, rendered as `module.operation(args)`.
    pub fn entries(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(Call::to_string)
            .collect()
    }

    /// True if any rendered call contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.entries().iter().any(|e| e.contains(needle))
    }

    /// Number of rendered calls starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.entries().iter().filter(|e| e.starts_with(prefix)).count()
    }

    /// Position of the first call starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.entries().iter().position(|e| e.starts_with(prefix))
    }

    /// Number of calls.
    pub fn len(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Logging and failure injection shared by the three mocks.
#[derive(Debug, Clone)]
pub(crate) struct MockPort {
    log: CallLog,
    prefix: &'static str,
    failing: Vec<&'static str>,
}

impl MockPort {
    pub(crate) fn new(log: CallLog, prefix: &'static str) -> Self {
        Self {
            log,
            prefix,
            failing: Vec::new(),
        }
    }

    pub(crate) fn fail(&mut self, operation: &'static str) {
        self.failing.push(operation);
    }

    /// Record `operation` and fail it if scripted to.
    pub(crate) fn call(
        &self,
        module: ModuleId,
        operation: &'static str,
        args: &[u32],
    ) -> Result<()> {
        self.log.record(Call {
            module: self.prefix,
            operation,
            args: args.to_vec(),
        });
        if self.failing.contains(&operation) {
            return Err(HardwareError::Rejected {
                module,
                operation,
                reason: "scripted failure".into(),
            });
        }
        Ok(())
    }
}
