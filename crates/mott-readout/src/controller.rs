//! The readout controller: configuration, programming, and per-trigger
//! readout of one VME crate.
//!
//! The four core operations are independent entry points:
//!
//! | Operation | Needs |
//! |-----------|-------|
//! | [`load_configuration`](ReadoutController::load_configuration) | a file |
//! | [`validate`](ReadoutController::validate) | a loaded file |
//! | [`program_hardware`](ReadoutController::program_hardware) | a validated configuration |
//! | [`assemble_event`](ReadoutController::assemble_event) | a validated configuration |
//!
//! The run-control phases (`download`, `prestart`, `go`, `end`, `trigger`)
//! sequence them the way the run-control system does.

use crate::assembler::{AssembledEvent, EventAssembler, TriggerContext};
use crate::buffer::EventBuffer;
use crate::config_bank;
use crate::error::{Result, RocError};
use crate::fault::AssemblyFault;
use crate::run_type::RunType;
use mott_core::config::{load_config_tree, ConfigStore, ConfigTree, RunConfiguration};
use mott_hardware::{program, DigitizerCrate, HelicityDecoder, ModuleSet, TriggerInterface};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Default readout controller id, used as the configuration-file bank tag.
pub const DEFAULT_ROC_ID: u16 = 1;

/// Readout controller over one set of modules.
pub struct ReadoutController<T, H, D> {
    store: ConfigStore,
    pending: Option<(PathBuf, ConfigTree)>,
    config_path: Option<PathBuf>,
    modules: ModuleSet<T, H, D>,
    assembler: EventAssembler,
    run_type: RunType,
    events: u32,
    roc_id: u16,
}

impl<T, H, D> ReadoutController<T, H, D>
where
    T: TriggerInterface,
    H: HelicityDecoder,
    D: DigitizerCrate,
{
    /// Controller over `modules` with no configuration.
    pub fn new(modules: ModuleSet<T, H, D>) -> Self {
        Self {
            store: ConfigStore::new(),
            pending: None,
            config_path: None,
            modules,
            assembler: EventAssembler::new(),
            run_type: RunType::default(),
            events: 0,
            roc_id: DEFAULT_ROC_ID,
        }
    }

    /// Use `assembler` for readout.
    pub fn with_assembler(mut self, assembler: EventAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    /// Readout controller id.
    pub fn with_roc_id(mut self, roc_id: u16) -> Self {
        self.roc_id = roc_id;
        self
    }

    // =========================================================================
    // Core operations
    // =========================================================================

    /// Parse `path` into a configuration tree and keep it for [`validate`](Self::validate).
    ///
    /// The stored configuration is not touched.
    pub fn load_configuration(&mut self, path: &Path) -> Result<()> {
        let tree = load_config_tree(path)?;
        debug!(path = %path.display(), "Configuration file parsed");
        self.pending = Some((path.to_path_buf(), tree));
        Ok(())
    }

    /// Validate the loaded tree and store the result. On failure the
    /// previous configuration and its file stay in place.
    pub fn validate(&mut self) -> Result<&RunConfiguration> {
        let (path, tree) = self.pending.as_ref().ok_or(RocError::NoConfigLoaded)?;
        let run = self.store.load(tree)?;
        self.config_path = Some(path.clone());
        Ok(run)
    }

    /// Program every module from the stored configuration.
    pub fn program_hardware(&mut self) -> Result<()> {
        let run = self.store.current().ok_or(RocError::NotConfigured)?;
        program(run, &mut self.modules)?;
        Ok(())
    }

    /// Read one trigger from every module.
    pub fn assemble_event(&mut self, ctx: &TriggerContext) -> Result<AssembledEvent> {
        let run = self.store.current().ok_or(RocError::NotConfigured)?;
        Ok(self.assembler.assemble(run, ctx, &mut self.modules))
    }

    /// Residual-data sweep outside of assembly.
    pub fn sync_check(&mut self) -> Result<Vec<AssemblyFault>> {
        let run = self.store.current().ok_or(RocError::NotConfigured)?;
        Ok(self
            .assembler
            .reconciler()
            .reconcile(run, self.run_type, self.events, &mut self.modules))
    }

    // =========================================================================
    // Run control
    // =========================================================================

    /// Select the run type, then load, validate and program from `path`,
    /// and route the TI trigger input.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub fn download(&mut self, path: &Path, user_string: &str) -> Result<()> {
        self.run_type = RunType::from_user_string(user_string);
        info!(run_type = %self.run_type, "Download");

        self.load_configuration(path)?;
        let blocklevel = self.validate()?.ti.blocklevel;
        self.program_hardware()?;

        let source = self.run_type.trigger_source();
        self.modules
            .ti
            .set_trigger_source(source)
            .map_err(RocError::run_control("download"))?;
        info!(%source, blocklevel, "Trigger source selected");

        self.log_status();
        Ok(())
    }

    /// Log module status and build the configuration-file event.
    pub fn prestart(&mut self) -> Result<EventBuffer> {
        if self.store.current().is_none() {
            return Err(RocError::NotConfigured);
        }
        let path = self.config_path.as_deref().ok_or(RocError::NoConfigLoaded)?;
        self.log_status();
        self.events = 0;
        config_bank::from_file(path, self.roc_id, self.assembler.capacity())
    }

    /// Start taking triggers.
    #[instrument(skip(self), fields(run_type = %self.run_type))]
    pub fn go(&mut self) -> Result<()> {
        let run = self.store.current().ok_or(RocError::NotConfigured)?;
        let err = RocError::run_control;
        let kind = self.run_type.digitizer();
        let slot = run.digitizer(kind).slot;
        let modules = &mut self.modules;

        match self.run_type {
            RunType::Counting => {
                modules.fadc.enable_sync_source().map_err(err("go"))?;
                modules.fadc.sync_reset(kind).map_err(err("go"))?;
                if run.helicity_decoder.enabled {
                    modules.hd.enable().map_err(err("go"))?;
                }
            }
            RunType::Integrating => {
                modules.fadc.sync_reset(kind).map_err(err("go"))?;
                modules.ti.enable_interrupts().map_err(err("go"))?;
            }
        }
        modules.fadc.enable(slot).map_err(err("go"))?;

        let (random, fixed) = (run.ti.random.enabled, run.ti.fixed.enabled);
        if random || fixed {
            modules.ti.start_pulsers(random, fixed).map_err(err("go"))?;
            info!(random, fixed, "TI pulsers started");
        }

        info!(slot, "Go");
        self.log_status();
        Ok(())
    }

    /// Stop taking triggers. Returns the TI block count.
    #[instrument(skip(self))]
    pub fn end(&mut self) -> Result<u32> {
        let run = self.store.current().ok_or(RocError::NotConfigured)?;
        let err = RocError::run_control;

        self.modules.fadc.disable_all().map_err(err("end"))?;
        if run.helicity_decoder.enabled {
            self.modules.hd.disable().map_err(err("end"))?;
        }
        if run.ti.random.enabled || run.ti.fixed.enabled {
            self.modules.ti.stop_pulsers().map_err(err("end"))?;
        }

        self.log_status();
        let blocks = self.modules.ti.interrupt_count();
        info!(blocks, events = self.events, "Ended after {blocks} blocks");
        Ok(blocks)
    }

    /// Assemble the next event with the controller's own event counter.
    pub fn trigger(&mut self) -> Result<AssembledEvent> {
        if self.store.current().is_none() {
            return Err(RocError::NotConfigured);
        }
        self.events = self.events.wrapping_add(1);
        let ctx = TriggerContext::new(self.events, self.run_type);
        let event = self.assemble_event(&ctx)?;
        if !event.is_clean() {
            warn!(
                event_number = event.event_number,
                faults = event.faults.len(),
                "Event assembled with faults"
            );
        }
        Ok(event)
    }

    /// Log the status of every module in use.
    pub fn log_status(&self) {
        info!(status = %self.modules.ti.status(), "TI");
        info!(status = %self.modules.fadc.status(), "fADC250");
        let hd_enabled = self
            .store
            .current()
            .is_some_and(|run| run.helicity_decoder.enabled);
        if hd_enabled {
            info!(status = %self.modules.hd.status(), "Helicity decoder");
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The stored configuration.
    pub fn configuration(&self) -> Option<&RunConfiguration> {
        self.store.current()
    }

    /// The configuration store.
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Selected run type.
    pub fn run_type(&self) -> RunType {
        self.run_type
    }

    /// Set the run type without a download.
    pub fn set_run_type(&mut self, run_type: RunType) {
        self.run_type = run_type;
    }

    /// Events assembled through [`trigger`](Self::trigger) since prestart.
    pub fn event_count(&self) -> u32 {
        self.events
    }

    /// The modules.
    pub fn modules(&self) -> &ModuleSet<T, H, D> {
        &self.modules
    }

    /// The modules, mutably.
    pub fn modules_mut(&mut self) -> &mut ModuleSet<T, H, D> {
        &mut self.modules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mott_core::ConfigError;
    use mott_hardware::mock::{CallLog, MockDigitizerCrate, MockHelicityDecoder, MockTriggerInterface};
    use mott_hardware::TriggerSource;
    use std::io::Write;
    use tempfile::NamedTempFile;

    type Mock = ReadoutController<MockTriggerInterface, MockHelicityDecoder, MockDigitizerCrate>;

    const CONFIG: &str = r#"
[ti]
blocklevel = 1
bufferlevel = 4
trigger_rules = [
    { period = 5, timestep = 1 },
    { period = 0, timestep = 0 },
    { period = 0, timestep = 0 },
    { period = 0, timestep = 0 },
]
random_pulser = { enabled = false }
fixed_pulser = { enabled = true, nevents = 0, period = 100, timestep = 1 }

[helicity_decoder]
enabled = true
slot = 9
address = 0x480000
internal_helicity = {}

[[fadc250]]
type = "counting"
slot = 4
address = 0x200000
dac = [3100, 3100, 3100, 3100, 3100, 3100, 3100, 3100, 3100, 3100, 3100, 3100, 3100, 3100, 3100, 3100]
threshold = [100, 100, 100, 100, 100, 100, 100, 100, 100, 100, 100, 100, 100, 100, 100, 100]

[[fadc250]]
type = "integrating"
slot = 6
address = 0x300000
dac = [3200, 3200, 3200, 3200, 3200, 3200, 3200, 3200, 3200, 3200, 3200, 3200, 3200, 3200, 3200, 3200]
threshold = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]
"#;

    fn write(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    fn controller() -> (Mock, CallLog) {
        let log = CallLog::new();
        let modules = ModuleSet::new(
            MockTriggerInterface::new(log.clone()),
            MockHelicityDecoder::new(log.clone()),
            MockDigitizerCrate::new(log.clone()),
        );
        (ReadoutController::new(modules), log)
    }

    #[test]
    fn test_operations_need_configuration() {
        let (mut roc, _) = controller();
        assert!(matches!(roc.validate(), Err(RocError::NoConfigLoaded)));
        assert!(matches!(roc.program_hardware(), Err(RocError::NotConfigured)));
        assert!(matches!(
            roc.assemble_event(&TriggerContext::new(1, RunType::Counting)),
            Err(RocError::NotConfigured)
        ));
        assert!(matches!(roc.sync_check(), Err(RocError::NotConfigured)));
        assert!(matches!(roc.trigger(), Err(RocError::NotConfigured)));
    }

    #[test]
    fn test_download_selects_trigger_source() {
        let file = write(CONFIG);
        let (mut roc, log) = controller();
        roc.download(file.path(), "integrating").unwrap();

        assert_eq!(roc.run_type(), RunType::Integrating);
        assert_eq!(
            roc.modules().ti.trigger_source(),
            Some(TriggerSource::FrontPanelTrg)
        );
        assert!(log.contains("ti.set_trigger_source(2)"));
        assert!(log.position("fadc.init").unwrap() < log.position("ti.init").unwrap());
    }

    #[test]
    fn test_failed_reload_keeps_configuration() {
        let good = write(CONFIG);
        let bad = write(&CONFIG.replace("type = \"integrating\"", "type = \"counting\""));
        let (mut roc, _) = controller();
        roc.download(good.path(), "").unwrap();
        let before = roc.configuration().cloned();

        roc.load_configuration(bad.path()).unwrap();
        let err = roc.validate().unwrap_err();
        assert!(matches!(
            err,
            RocError::Config(ConfigError::WrongCardinality { .. })
        ));
        assert_eq!(roc.configuration().cloned(), before);
    }

    #[test]
    fn test_prestart_records_stored_configuration_file() {
        let good = write(CONFIG);
        let bad = write(&CONFIG.replace("type = \"integrating\"", "type = \"counting\""));
        let (mut roc, _) = controller();
        roc.download(good.path(), "counting").unwrap();

        roc.load_configuration(bad.path()).unwrap();
        assert!(roc.validate().is_err());

        let prestart = roc.prestart().unwrap();
        let embedded = config_bank::decode(prestart.words()).unwrap();
        assert_eq!(embedded, CONFIG.as_bytes());
    }

    #[test]
    fn test_parsed_file_is_not_recorded_before_validation() {
        let good = write(CONFIG);
        let (mut roc, _) = controller();
        roc.load_configuration(good.path()).unwrap();
        assert!(matches!(roc.prestart(), Err(RocError::NotConfigured)));

        roc.validate().unwrap();
        assert!(roc.prestart().is_ok());
    }

    #[test]
    fn test_run_cycle() {
        let file = write(CONFIG);
        let (mut roc, log) = controller();
        roc.download(file.path(), "counting").unwrap();

        let prestart = roc.prestart().unwrap();
        assert_eq!(
            config_bank::decode(prestart.words()).unwrap(),
            CONFIG.as_bytes()
        );

        roc.go().unwrap();
        assert!(roc.modules().fadc.sync_source_enabled());
        assert!(roc.modules().hd.is_enabled());
        assert!(roc.modules().fadc.module(4).unwrap().enabled);
        assert!(!roc.modules().fadc.module(6).unwrap().enabled);
        assert_eq!(roc.modules().ti.pulsers_running(), (false, true));

        for n in 1..=3 {
            let event = roc.trigger().unwrap();
            assert_eq!(event.event_number, n);
            assert!(event.is_clean(), "{:?}", event.faults);
        }

        assert_eq!(roc.end().unwrap(), 3);
        assert!(!roc.modules().hd.is_enabled());
        assert_eq!(roc.modules().ti.pulsers_running(), (false, false));
        assert!(log.contains("fadc.disable_all"));
    }

    #[test]
    fn test_integrating_go_enables_interrupts() {
        let file = write(CONFIG);
        let (mut roc, log) = controller();
        roc.download(file.path(), "integrating").unwrap();
        roc.go().unwrap();

        assert!(log.contains("ti.enable_interrupts"));
        assert!(!log.contains("fadc.enable_sync_source"));
        assert_eq!(log.count("hd.enable()"), 0);
        assert!(roc.modules().fadc.module(6).unwrap().enabled);
    }

    #[test]
    fn test_programming_error_surfaces() {
        let file = write(CONFIG);
        let (mut roc, _) = controller();
        roc.modules_mut().fadc.fail_operation("set_dac");
        let err = roc.download(file.path(), "").unwrap_err();
        assert!(matches!(err, RocError::Programming(_)));
        assert!(!err.is_config());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let (mut roc, _) = controller();
        let err = roc
            .load_configuration(Path::new("/nonexistent/uitf.toml"))
            .unwrap_err();
        assert!(matches!(err, RocError::Config(ConfigError::Io { .. })));
        assert!(err.is_config());
    }
}
