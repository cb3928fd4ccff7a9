//! Declarative field tables.
//!
//! Each record type has a table of `(name, accessor, default)` entries; one
//! generic loop ([`fill`]) looks every name up in a group node and writes the
//! value through the accessor. A name absent from the group writes the
//! default, which keeps the "missing scalar is not an error" rule in one
//! place.

use super::schema::{
    DigitizerConfig, FixedPulser, HelicityDecoderConfig, InternalHelicityConfig, RandomPulser,
    TriggerInterfaceConfig, TriggerRule,
};
use super::tree::{ConfigNode, Scalar};
use crate::error::{ConfigError, Result};
use tracing::trace;

/// One named scalar of record `R` holding a `V`.
pub struct Field<R, V> {
    /// Key looked up in the group node.
    pub name: &'static str,
    /// Where the value is stored in the record.
    pub slot: fn(&mut R) -> &mut V,
    /// Value used when the key is absent.
    pub default: V,
}

/// Scalar types a field can hold.
pub trait FieldValue: Copy + Sized {
    /// Convert a present node, or explain why it cannot be used.
    fn from_node(node: &ConfigNode, path: &str) -> Result<Self>;
}

impl FieldValue for u32 {
    fn from_node(node: &ConfigNode, path: &str) -> Result<Self> {
        match node.as_scalar() {
            Some(Scalar::Int(v)) => u32::try_from(*v).map_err(|_| {
                ConfigError::invalid(path, format!("{v} does not fit an unsigned 32-bit register"))
            }),
            _ => Err(ConfigError::invalid(
                path,
                format!("expected integer, found {}", node.kind()),
            )),
        }
    }
}

impl FieldValue for bool {
    fn from_node(node: &ConfigNode, path: &str) -> Result<Self> {
        match node.as_scalar() {
            Some(Scalar::Bool(b)) => Ok(*b),
            Some(Scalar::Int(v)) => Ok(*v != 0),
            _ => Err(ConfigError::invalid(
                path,
                format!("expected boolean or integer, found {}", node.kind()),
            )),
        }
    }
}

/// Write every field of `table` from `group` into `record`.
pub fn fill<R, V: FieldValue>(
    group: &ConfigNode,
    path: &str,
    record: &mut R,
    table: &[Field<R, V>],
) -> Result<()> {
    for field in table {
        let value = match group.member(field.name) {
            Some(node) => V::from_node(node, &join(path, field.name))?,
            None => {
                trace!(field = %join(path, field.name), "not set, using default");
                field.default
            }
        };
        *(field.slot)(record) = value;
    }
    Ok(())
}

/// Dotted path of a child key.
pub fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

macro_rules! fields {
    ($record:ty, $value:ty, $default:expr; $($name:ident),+ $(,)?) => {
        &[$(Field::<$record, $value> {
            name: stringify!($name),
            slot: |r| &mut r.$name,
            default: $default,
        }),+]
    };
}

// =============================================================================
// Tables
// =============================================================================

/// `ti` scalars.
pub const TI_FIELDS: &[Field<TriggerInterfaceConfig, u32>] =
    fields!(TriggerInterfaceConfig, u32, 0; blocklevel, bufferlevel, prescale);

/// `ti.trigger_rules[n]` scalars.
pub const TRIGGER_RULE_FIELDS: &[Field<TriggerRule, u32>] =
    fields!(TriggerRule, u32, 0; period, timestep);

/// `ti.random_pulser` flag.
pub const RANDOM_PULSER_FLAGS: &[Field<RandomPulser, bool>] =
    fields!(RandomPulser, bool, false; enabled);

/// `ti.random_pulser` scalars.
pub const RANDOM_PULSER_FIELDS: &[Field<RandomPulser, u32>] =
    fields!(RandomPulser, u32, 0; prescale);

/// `ti.fixed_pulser` flag.
pub const FIXED_PULSER_FLAGS: &[Field<FixedPulser, bool>] =
    fields!(FixedPulser, bool, false; enabled);

/// `ti.fixed_pulser` scalars.
pub const FIXED_PULSER_FIELDS: &[Field<FixedPulser, u32>] =
    fields!(FixedPulser, u32, 0; nevents, period, timestep);

/// `helicity_decoder` flags.
pub const HD_FLAGS: &[Field<HelicityDecoderConfig, bool>] =
    fields!(HelicityDecoderConfig, bool, false; enabled, use_internal_helicity);

/// `helicity_decoder` scalars.
pub const HD_FIELDS: &[Field<HelicityDecoderConfig, u32>] = fields!(
    HelicityDecoderConfig, u32, 0;
    address, slot, input_delay, trigger_latency_delay,
);

/// `helicity_decoder.internal_helicity` scalars.
pub const INTERNAL_HELICITY_FIELDS: &[Field<InternalHelicityConfig, u32>] = fields!(
    InternalHelicityConfig, u32, 0;
    helicity_pattern, window_delay, settle_time, stable_time, seed,
);

/// `fadc250[n]` scalars.
pub const DIGITIZER_FIELDS: &[Field<DigitizerConfig, u32>] = fields!(
    DigitizerConfig, u32, 0;
    address, slot, sd_fp_address, init_arg,
    mode, pl, ptw, nsb, nsa, np,
    delay8, delay9, delay11,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_present_and_absent() {
        let group = ConfigNode::group([
            ("blocklevel", ConfigNode::from(4u32)),
            ("prescale", ConfigNode::from(2u32)),
        ]);
        let mut ti = TriggerInterfaceConfig {
            bufferlevel: 99,
            ..Default::default()
        };
        fill(&group, "ti", &mut ti, TI_FIELDS).unwrap();

        assert_eq!(ti.blocklevel, 4);
        assert_eq!(ti.prescale, 2);
        // Absent scalars are written with the default, not left alone.
        assert_eq!(ti.bufferlevel, 0);
    }

    #[test]
    fn test_negative_value_rejected() {
        let group = ConfigNode::group([("blocklevel", ConfigNode::from(-1i64))]);
        let mut ti = TriggerInterfaceConfig::default();
        let err = fill(&group, "ti", &mut ti, TI_FIELDS).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref path, .. } if path == "ti.blocklevel"
        ));
    }

    #[test]
    fn test_oversized_value_rejected() {
        let group = ConfigNode::group([("prescale", ConfigNode::from(1i64 << 32))]);
        let mut ti = TriggerInterfaceConfig::default();
        assert!(fill(&group, "ti", &mut ti, TI_FIELDS).is_err());
    }

    #[test]
    fn test_string_value_rejected() {
        let group = ConfigNode::group([("slot", ConfigNode::from("three"))]);
        let mut d = DigitizerConfig::default();
        let err = fill(&group, "fadc250[0]", &mut d, DIGITIZER_FIELDS).unwrap_err();
        assert!(err.to_string().contains("fadc250[0].slot"));
        assert!(err.to_string().contains("string"));
    }

    #[test]
    fn test_flags_accept_bool_and_int() {
        let group = ConfigNode::group([
            ("enabled", ConfigNode::from(1u32)),
            ("use_internal_helicity", ConfigNode::from(false)),
        ]);
        let mut hd = HelicityDecoderConfig::default();
        fill(&group, "helicity_decoder", &mut hd, HD_FLAGS).unwrap();
        assert!(hd.enabled);
        assert!(!hd.use_internal_helicity);
    }

    #[test]
    fn test_table_names_are_unique() {
        let mut names: Vec<_> = DIGITIZER_FIELDS.iter().map(|f| f.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), DIGITIZER_FIELDS.len());
    }
}
