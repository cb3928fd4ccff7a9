//! Run-start programming of every module from a validated configuration.
//!
//! Each `program_*` function is a straight list of register writes; the
//! first failing write aborts and is returned unchanged.

use crate::error::Result;
use crate::hal::{ClockSource, DigitizerCrate, HelicityDecoder, ModuleSet, TriggerInterface};
use mott_core::config::{
    DigitizerConfig, HelicityDecoderConfig, RunConfiguration, TriggerInterfaceConfig,
};
use tracing::{debug, info, instrument};

/// Program every module for a run.
///
/// Digitizers first (both of them, whatever the run type), then the TI, then
/// the helicity decoder if it is enabled.
#[instrument(skip_all)]
pub fn program<T, H, D>(run: &RunConfiguration, modules: &mut ModuleSet<T, H, D>) -> Result<()>
where
    T: TriggerInterface,
    H: HelicityDecoder,
    D: DigitizerCrate,
{
    for digitizer in run.fadc250.iter() {
        program_digitizer(digitizer, &mut modules.fadc)?;
    }
    program_trigger_interface(&run.ti, &mut modules.ti)?;
    if run.helicity_decoder.enabled {
        program_helicity_decoder(&run.helicity_decoder, &mut modules.hd)?;
    } else {
        debug!("Helicity decoder disabled, not programmed");
    }
    info!("All modules programmed");
    Ok(())
}

/// Program one fADC250.
pub fn program_digitizer<D: DigitizerCrate>(cfg: &DigitizerConfig, fadc: &mut D) -> Result<()> {
    let slot = cfg.slot;
    debug!(kind = %cfg.kind, slot, address = cfg.address, "Programming fADC250");

    fadc.init(slot, cfg.address, cfg.init_arg)?;
    fadc.set_sd_fp_address(slot, cfg.sd_fp_address)?;
    fadc.set_clock_source(slot, ClockSource::Vxs)?;
    fadc.reset_counters(slot)?;
    fadc.enable_bus_error(slot)?;

    for (channel, (dac, threshold)) in (0u32..).zip(cfg.dac.iter().zip(cfg.threshold.iter())) {
        fadc.set_dac(slot, channel, *dac)?;
        fadc.set_threshold(slot, channel, *threshold)?;
    }

    fadc.set_processing_mode(slot, &cfg.processing())?;

    for (channel, delay) in cfg.channel_delays() {
        fadc.set_channel_delay(slot, channel, delay)?;
    }
    Ok(())
}

/// Program the trigger interface. The TI address is fixed at slot 3.
pub fn program_trigger_interface<T: TriggerInterface>(
    cfg: &TriggerInterfaceConfig,
    ti: &mut T,
) -> Result<()> {
    debug!(blocklevel = cfg.blocklevel, "Programming TI");

    ti.init(TI_ADDRESS)?;
    ti.load_trigger_table()?;
    ti.set_block_level(cfg.blocklevel)?;
    ti.set_block_buffer_level(cfg.bufferlevel)?;
    ti.set_prescale(cfg.prescale)?;

    for (rule, r) in (1u32..).zip(cfg.rules.iter()) {
        ti.set_trigger_holdoff(rule, r.period, r.timestep)?;
    }

    if cfg.random.enabled {
        ti.set_random_pulser(cfg.random.prescale)?;
    }
    if cfg.fixed.enabled {
        ti.set_fixed_pulser(cfg.fixed.nevents, cfg.fixed.period, cfg.fixed.timestep)?;
    }
    Ok(())
}

/// Program the helicity decoder. Callers check `cfg.enabled`.
pub fn program_helicity_decoder<H: HelicityDecoder>(
    cfg: &HelicityDecoderConfig,
    hd: &mut H,
) -> Result<()> {
    debug!(slot = cfg.slot, internal = cfg.use_internal_helicity, "Programming helicity decoder");

    hd.init(cfg.address, cfg.slot)?;
    hd.set_processing_delays(cfg.input_delay, cfg.trigger_latency_delay)?;
    hd.enable_decoder()?;

    if cfg.use_internal_helicity {
        hd.set_internal_helicity(&cfg.internal)?;
        hd.enable_internal_helicity()?;
    }
    Ok(())
}

/// A24 address of the TI master (slot 3).
pub const TI_ADDRESS: u32 = 3 << 19;
