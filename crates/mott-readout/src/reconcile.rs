//! End-of-block check on sync events.
//!
//! After a sync event every module must be empty. Anything left over is
//! reported and flushed so it cannot leak into the next block. Flushed
//! words are discarded, never appended to the event.

use crate::fault::AssemblyFault;
use crate::run_type::RunType;
use mott_core::config::RunConfiguration;
use mott_hardware::{
    DigitizerCrate, HardwareError, HelicityDecoder, ModuleId, ModuleSet, TriggerInterface,
};
use tracing::{error, warn};

/// Flushes issued per module before giving up.
pub const MAX_FLUSH_ATTEMPTS: u32 = 1024;

/// A module that can report and discard leftover blocks.
trait Drain {
    fn module(&self) -> ModuleId;
    fn available(&mut self) -> u32;
    fn flush_one(&mut self) -> Result<(), HardwareError>;
}

struct TiDrain<'a, T>(&'a mut T);
struct HdDrain<'a, H>(&'a mut H);
struct FadcDrain<'a, D> {
    fadc: &'a mut D,
    slot: u32,
}

impl<T: TriggerInterface> Drain for TiDrain<'_, T> {
    fn module(&self) -> ModuleId {
        ModuleId::TriggerInterface
    }
    fn available(&mut self) -> u32 {
        self.0.residual()
    }
    fn flush_one(&mut self) -> Result<(), HardwareError> {
        self.0.flush()
    }
}

impl<H: HelicityDecoder> Drain for HdDrain<'_, H> {
    fn module(&self) -> ModuleId {
        ModuleId::HelicityDecoder
    }
    fn available(&mut self) -> u32 {
        self.0.residual()
    }
    fn flush_one(&mut self) -> Result<(), HardwareError> {
        self.0.flush()
    }
}

impl<D: DigitizerCrate> Drain for FadcDrain<'_, D> {
    fn module(&self) -> ModuleId {
        ModuleId::Digitizer(self.slot)
    }
    fn available(&mut self) -> u32 {
        self.fadc.residual(self.slot)
    }
    fn flush_one(&mut self) -> Result<(), HardwareError> {
        self.fadc.flush(self.slot)
    }
}

/// Residual-data sweep over TI, helicity decoder (if enabled) and the
/// active digitizers.
#[derive(Debug, Clone, Copy)]
pub struct SyncReconciler {
    max_flushes: u32,
}

impl Default for SyncReconciler {
    fn default() -> Self {
        Self {
            max_flushes: MAX_FLUSH_ATTEMPTS,
        }
    }
}

impl SyncReconciler {
    /// Reconciler with the default flush bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconciler giving up after `max_flushes` flushes per module.
    pub fn with_max_flushes(max_flushes: u32) -> Self {
        Self { max_flushes }
    }

    /// Check every module and flush leftovers. Returns one fault per module
    /// that had data, plus one per module that could not be emptied.
    pub fn reconcile<T, H, D>(
        &self,
        run: &RunConfiguration,
        run_type: RunType,
        event_number: u32,
        modules: &mut ModuleSet<T, H, D>,
    ) -> Vec<AssemblyFault>
    where
        T: TriggerInterface,
        H: HelicityDecoder,
        D: DigitizerCrate,
    {
        let mut faults = Vec::new();

        self.drain(&mut TiDrain(&mut modules.ti), event_number, &mut faults);

        if run.helicity_decoder.enabled {
            self.drain(&mut HdDrain(&mut modules.hd), event_number, &mut faults);
        }

        for digitizer in run_type.active_digitizers(run) {
            let mut source = FadcDrain {
                fadc: &mut modules.fadc,
                slot: digitizer.slot,
            };
            self.drain(&mut source, event_number, &mut faults);
        }

        faults
    }

    fn drain(&self, source: &mut impl Drain, event_number: u32, faults: &mut Vec<AssemblyFault>) {
        let available = source.available();
        if available == 0 {
            return;
        }
        let module = source.module();
        error!(
            %module,
            event_number,
            available,
            "ERROR: {module} Data available ({available}) after readout in SYNC event"
        );

        let mut flushes = 0;
        let mut remaining = available;
        while remaining > 0 && flushes < self.max_flushes {
            if let Err(e) = source.flush_one() {
                warn!(%module, event_number, error = %e, "Flush failed");
                break;
            }
            flushes += 1;
            remaining = source.available();
        }

        faults.push(AssemblyFault::ResidualData {
            module,
            event_number,
            available,
            flushes,
        });

        if remaining > 0 {
            error!(%module, event_number, remaining, flushes, "Residual data not drained");
            faults.push(AssemblyFault::FlushIncomplete {
                module,
                event_number,
                remaining,
                attempts: flushes,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mott_core::config::{DigitizerConfig, DigitizerSet, DigitizerType};
    use mott_hardware::mock::{CallLog, MockDigitizerCrate, MockHelicityDecoder, MockTriggerInterface};
    use tracing_test::traced_test;

    type Mocks = ModuleSet<MockTriggerInterface, MockHelicityDecoder, MockDigitizerCrate>;

    fn setup(hd_enabled: bool) -> (RunConfiguration, Mocks, CallLog) {
        let mut counting = DigitizerConfig::zeroed(DigitizerType::Counting);
        counting.slot = 4;
        let mut integrating = DigitizerConfig::zeroed(DigitizerType::Integrating);
        integrating.slot = 6;
        let mut run = RunConfiguration {
            fadc250: DigitizerSet::new(counting, integrating),
            ..Default::default()
        };
        run.helicity_decoder.enabled = hd_enabled;

        let log = CallLog::new();
        let modules = ModuleSet::new(
            MockTriggerInterface::new(log.clone()),
            MockHelicityDecoder::new(log.clone()),
            MockDigitizerCrate::new(log.clone()),
        );
        (run, modules, log)
    }

    #[test]
    fn test_clean_modules_no_faults() {
        let (run, mut m, log) = setup(true);
        let faults = SyncReconciler::new().reconcile(&run, RunType::Counting, 1, &mut m);
        assert!(faults.is_empty());
        assert!(log.is_empty());
    }

    #[test]
    #[traced_test]
    fn test_residual_flushed_until_empty() {
        let (run, mut m, log) = setup(true);
        m.ti.set_residual(2, false);
        m.hd.set_residual(1, false);
        m.fadc.set_residual(4, 3, false);

        let faults = SyncReconciler::new().reconcile(&run, RunType::Counting, 9, &mut m);

        assert_eq!(
            faults,
            vec![
                AssemblyFault::ResidualData {
                    module: ModuleId::TriggerInterface,
                    event_number: 9,
                    available: 2,
                    flushes: 2
                },
                AssemblyFault::ResidualData {
                    module: ModuleId::HelicityDecoder,
                    event_number: 9,
                    available: 1,
                    flushes: 1
                },
                AssemblyFault::ResidualData {
                    module: ModuleId::Digitizer(4),
                    event_number: 9,
                    available: 3,
                    flushes: 3
                },
            ]
        );
        assert_eq!(log.count("ti.flush"), 2);
        assert_eq!(log.count("fadc.flush(4)"), 3);
        assert!(logs_contain("TI Data available (2) after readout in SYNC event"));
    }

    #[test]
    fn test_disabled_decoder_not_checked() {
        let (run, mut m, log) = setup(false);
        m.hd.set_residual(5, false);
        let faults = SyncReconciler::new().reconcile(&run, RunType::Counting, 1, &mut m);
        assert!(faults.is_empty());
        assert_eq!(log.count("hd."), 0);
    }

    #[test]
    fn test_only_active_digitizer_checked() {
        let (run, mut m, _) = setup(false);
        m.fadc.set_residual(6, 2, false);
        let faults = SyncReconciler::new().reconcile(&run, RunType::Counting, 1, &mut m);
        assert!(faults.is_empty());

        let faults = SyncReconciler::new().reconcile(&run, RunType::Integrating, 1, &mut m);
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].module(), ModuleId::Digitizer(6));
    }

    #[test]
    fn test_sticky_residual_bounded() {
        let (run, mut m, log) = setup(false);
        m.ti.set_residual(1, true);
        let faults = SyncReconciler::with_max_flushes(5).reconcile(&run, RunType::Counting, 3, &mut m);

        assert_eq!(log.count("ti.flush"), 5);
        assert_eq!(
            faults[1],
            AssemblyFault::FlushIncomplete {
                module: ModuleId::TriggerInterface,
                event_number: 3,
                remaining: 1,
                attempts: 5
            }
        );
    }

    #[test]
    fn test_failing_flush_stops() {
        let (run, mut m, log) = setup(false);
        m.ti.set_residual(3, false);
        m.ti.fail_operation("flush");
        let faults = SyncReconciler::new().reconcile(&run, RunType::Counting, 1, &mut m);

        assert_eq!(log.count("ti.flush"), 1);
        assert!(matches!(faults[0], AssemblyFault::ResidualData { flushes: 0, .. }));
        assert!(matches!(faults[1], AssemblyFault::FlushIncomplete { remaining: 3, .. }));
    }
}
