//! Typed parameter records for the modules in the Mott crate.
//!
//! These are the values the programmer writes into hardware registers, so
//! every numeric field is a plain `u32`. All records start zeroed: a field
//! absent from the configuration file programs as 0.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// Number of trigger holdoff rules on the trigger interface.
pub const TRIGGER_RULE_COUNT: usize = 4;

/// Number of input channels on one fADC250.
pub const FADC_CHANNELS: usize = 16;

// =============================================================================
// Trigger Interface
// =============================================================================

/// One trigger holdoff rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TriggerRule {
    /// Holdoff period, in `timestep` units.
    pub period: u32,
    /// Timestep selector for the period.
    pub timestep: u32,
}

/// TI internal random pulser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RandomPulser {
    /// Whether the pulser is started at go.
    pub enabled: bool,
    /// Rate prescale.
    pub prescale: u32,
}

/// TI internal fixed-rate pulser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FixedPulser {
    /// Whether the pulser is started at go.
    pub enabled: bool,
    /// Number of events to generate.
    pub nevents: u32,
    /// Period between events, in `timestep` units.
    pub period: u32,
    /// Timestep selector for the period.
    pub timestep: u32,
}

/// Trigger interface parameters. Owns all trigger-timing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TriggerInterfaceConfig {
    /// Events per readout block.
    pub blocklevel: u32,
    /// Blocks buffered before the TI asserts busy.
    pub bufferlevel: u32,
    /// Input prescale.
    pub prescale: u32,
    /// Holdoff rules; index is the rule slot.
    pub rules: [TriggerRule; TRIGGER_RULE_COUNT],
    /// Random pulser.
    pub random: RandomPulser,
    /// Fixed pulser.
    pub fixed: FixedPulser,
}

// =============================================================================
// Helicity Decoder
// =============================================================================

/// Parameters of the decoder's internal helicity generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct InternalHelicityConfig {
    /// Pattern selector (pair, quartet, octet, ...).
    pub helicity_pattern: u32,
    /// Delay of the reported helicity, in windows.
    pub window_delay: u32,
    /// Settle time of each window.
    pub settle_time: u32,
    /// Stable time of each window.
    pub stable_time: u32,
    /// Pseudo-random generator seed.
    pub seed: u32,
}

/// Helicity decoder parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct HelicityDecoderConfig {
    /// Whether the decoder is read out at all.
    pub enabled: bool,
    /// A24 VME address.
    pub address: u32,
    /// Crate slot.
    pub slot: u32,
    /// Input processing delay.
    pub input_delay: u32,
    /// Trigger latency delay.
    pub trigger_latency_delay: u32,
    /// Generate helicity internally instead of decoding the input.
    pub use_internal_helicity: bool,
    /// Internal generator settings, used only with `use_internal_helicity`.
    pub internal: InternalHelicityConfig,
}

// =============================================================================
// Digitizers
// =============================================================================

/// Operating mode of a digitizer. Identifies the module for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DigitizerType {
    /// Pulse counting.
    #[default]
    Counting,
    /// Charge integrating.
    Integrating,
}

impl DigitizerType {
    /// Both types, in storage order.
    pub const ALL: [DigitizerType; 2] = [DigitizerType::Counting, DigitizerType::Integrating];

    /// Storage index of this type.
    pub fn index(self) -> usize {
        match self {
            DigitizerType::Counting => 0,
            DigitizerType::Integrating => 1,
        }
    }

    /// Case-insensitive parse of `counting` / `integrating`.
    pub fn parse(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("counting") {
            Some(DigitizerType::Counting)
        } else if name.eq_ignore_ascii_case("integrating") {
            Some(DigitizerType::Integrating)
        } else {
            None
        }
    }

    /// Lower-case name as used in configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            DigitizerType::Counting => "counting",
            DigitizerType::Integrating => "integrating",
        }
    }
}

impl fmt::Display for DigitizerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pulse-processing parameters of one fADC250.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ProcessingParams {
    /// Processing mode.
    pub mode: u32,
    /// Trigger window latency.
    pub pl: u32,
    /// Trigger window width.
    pub ptw: u32,
    /// Samples before threshold crossing.
    pub nsb: u32,
    /// Samples after threshold crossing.
    pub nsa: u32,
    /// Maximum pulses per window.
    pub np: u32,
}

/// Parameters of one fADC250.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DigitizerConfig {
    /// Counting or integrating; decides where the record is stored.
    #[serde(rename = "type")]
    pub kind: DigitizerType,
    /// A24 VME address.
    pub address: u32,
    /// Crate slot.
    pub slot: u32,
    /// Front-panel address on the signal distribution board.
    pub sd_fp_address: u32,
    /// Flags passed to module initialization.
    pub init_arg: u32,
    /// Processing mode.
    pub mode: u32,
    /// Trigger window latency.
    pub pl: u32,
    /// Trigger window width.
    pub ptw: u32,
    /// Samples before threshold crossing.
    pub nsb: u32,
    /// Samples after threshold crossing.
    pub nsa: u32,
    /// Maximum pulses per window.
    pub np: u32,
    /// Input delay of channel 8.
    pub delay8: u32,
    /// Input delay of channel 9.
    pub delay9: u32,
    /// Input delay of channel 11.
    pub delay11: u32,
    /// Per-channel threshold; index is the channel.
    pub threshold: [u32; FADC_CHANNELS],
    /// Per-channel DAC pedestal level; index is the channel.
    pub dac: [u32; FADC_CHANNELS],
}

impl DigitizerConfig {
    /// A zeroed record of the given type.
    pub fn zeroed(kind: DigitizerType) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// The pulse-processing block, as programmed in one call.
    pub fn processing(&self) -> ProcessingParams {
        ProcessingParams {
            mode: self.mode,
            pl: self.pl,
            ptw: self.ptw,
            nsb: self.nsb,
            nsa: self.nsa,
            np: self.np,
        }
    }

    /// `(channel, delay)` pairs for the channels with a configurable delay.
    pub fn channel_delays(&self) -> [(u32, u32); 3] {
        [(8, self.delay8), (9, self.delay9), (11, self.delay11)]
    }

    /// Bit of this module's slot in a crate-wide slot mask.
    pub fn slot_mask(&self) -> u32 {
        1u32.checked_shl(self.slot).unwrap_or(0)
    }
}

/// The two digitizers, stored by type.
///
/// Lookup is by [`DigitizerType`] only; the list position the records had in
/// the configuration file is not kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigitizerSet {
    modules: [DigitizerConfig; 2],
}

impl DigitizerSet {
    /// Build from one record of each type.
    pub fn new(counting: DigitizerConfig, integrating: DigitizerConfig) -> Self {
        let mut counting = counting;
        let mut integrating = integrating;
        counting.kind = DigitizerType::Counting;
        integrating.kind = DigitizerType::Integrating;
        Self {
            modules: [counting, integrating],
        }
    }

    /// Record for the given type.
    pub fn get(&self, kind: DigitizerType) -> &DigitizerConfig {
        &self.modules[kind.index()]
    }

    /// Both records, counting first.
    pub fn iter(&self) -> impl Iterator<Item = &DigitizerConfig> {
        self.modules.iter()
    }
}

impl Serialize for DigitizerSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.modules.len()))?;
        for module in &self.modules {
            map.serialize_entry(module.kind.as_str(), module)?;
        }
        map.end()
    }
}

impl Default for DigitizerSet {
    fn default() -> Self {
        Self::new(
            DigitizerConfig::zeroed(DigitizerType::Counting),
            DigitizerConfig::zeroed(DigitizerType::Integrating),
        )
    }
}

// =============================================================================
// Run Configuration
// =============================================================================

/// A fully validated configuration for one run.
///
/// Only [`super::validate`] builds these from a tree; once built the value
/// is never mutated, a reload replaces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RunConfiguration {
    /// Trigger interface.
    pub ti: TriggerInterfaceConfig,
    /// Helicity decoder.
    pub helicity_decoder: HelicityDecoderConfig,
    /// The two digitizers.
    pub fadc250: DigitizerSet,
}

impl RunConfiguration {
    /// Digitizer record for the given type.
    pub fn digitizer(&self, kind: DigitizerType) -> &DigitizerConfig {
        self.fadc250.get(kind)
    }

    /// Flattened `(dotted.path, value)` listing of every parameter.
    ///
    /// Arrays are expanded per index (`fadc250.counting.dac.3`), so the
    /// listing can be logged or diffed line by line.
    pub fn parameters(&self) -> Vec<(String, u64)> {
        let mut out = Vec::new();
        match serde_json::to_value(self) {
            Ok(value) => flatten("", &value, &mut out),
            Err(e) => tracing::error!(error = %e, "Failed to serialize run configuration"),
        }
        out
    }
}

fn flatten(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, u64)>) {
    let join = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        }
    };
    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                if key != "type" {
                    flatten(&join(key), child, out);
                }
            }
        }
        serde_json::Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten(&join(&i.to_string()), item, out);
            }
        }
        serde_json::Value::Bool(b) => out.push((prefix.to_string(), u64::from(*b))),
        serde_json::Value::Number(n) => out.push((prefix.to_string(), n.as_u64().unwrap_or(0))),
        _ => {}
    }
}
