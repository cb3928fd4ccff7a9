//! Tree → [`RunConfiguration`] validation.
//!
//! Structure is checked strictly (sections present and non-empty, fixed
//! list lengths, known digitizer types); scalars are looked up leniently
//! through the field tables. Sections are visited in a fixed order (ti,
//! helicity_decoder, fadc250[0], fadc250[1]) so the first reported error
//! is deterministic.

use super::fields::{self, fill, join};
use super::schema::{
    DigitizerConfig, DigitizerSet, DigitizerType, HelicityDecoderConfig, RunConfiguration,
    TriggerInterfaceConfig, TriggerRule, FADC_CHANNELS, TRIGGER_RULE_COUNT,
};
use super::tree::{ConfigNode, ConfigTree};
use crate::error::{ConfigError, Result};
use tracing::{debug, error};

/// Number of fADC250 modules in the crate.
pub const DIGITIZER_COUNT: usize = 2;

/// Validate a configuration tree.
///
/// Pure: the same tree always yields the same result. Failures are logged
/// here and returned; the caller decides whether to keep an older
/// configuration.
pub fn validate(tree: &ConfigTree) -> Result<RunConfiguration> {
    let result = validate_root(tree.root());
    if let Err(e) = &result {
        error!(
            source = %tree.source().map(|p| p.display().to_string()).unwrap_or_default(),
            "ERROR: {e}"
        );
    }
    result
}

fn validate_root(root: &ConfigNode) -> Result<RunConfiguration> {
    let ti = parse_trigger_interface(required_section(root, "ti")?)?;
    let helicity_decoder = parse_helicity_decoder(required_section(root, "helicity_decoder")?)?;
    let fadc250 = parse_digitizers(root)?;

    debug!(
        blocklevel = ti.blocklevel,
        hd_enabled = helicity_decoder.enabled,
        "Run configuration validated"
    );

    Ok(RunConfiguration {
        ti,
        helicity_decoder,
        fadc250,
    })
}

/// A top-level group that must be present and non-empty.
fn required_section<'a>(root: &'a ConfigNode, name: &str) -> Result<&'a ConfigNode> {
    match root.member(name) {
        Some(node) if node.is_group() && !node.is_empty() => Ok(node),
        _ => Err(ConfigError::missing(name)),
    }
}

/// A nested group that must be present (it may be empty).
fn required_group<'a>(parent: &'a ConfigNode, path: &str, name: &str) -> Result<&'a ConfigNode> {
    match parent.member(name) {
        Some(node) if node.is_group() => Ok(node),
        _ => Err(ConfigError::missing(join(path, name))),
    }
}

/// A nested list that must be present with exactly `expected` elements.
fn required_list<'a>(
    parent: &'a ConfigNode,
    path: &str,
    name: &str,
    expected: usize,
) -> Result<&'a [ConfigNode]> {
    let list = parent
        .member(name)
        .and_then(ConfigNode::as_list)
        .ok_or_else(|| ConfigError::missing(join(path, name)))?;
    if list.len() != expected {
        return Err(ConfigError::cardinality(join(path, name), expected, list.len()));
    }
    Ok(list)
}

fn parse_trigger_interface(node: &ConfigNode) -> Result<TriggerInterfaceConfig> {
    let mut ti = TriggerInterfaceConfig::default();
    fill(node, "ti", &mut ti, fields::TI_FIELDS)?;

    let rules = required_list(node, "ti", "trigger_rules", TRIGGER_RULE_COUNT)?;
    for (i, rule_node) in rules.iter().enumerate() {
        let path = format!("ti.trigger_rules[{i}]");
        if !rule_node.is_group() {
            return Err(ConfigError::invalid(
                path,
                format!("expected group, found {}", rule_node.kind()),
            ));
        }
        let mut rule = TriggerRule::default();
        fill(rule_node, &path, &mut rule, fields::TRIGGER_RULE_FIELDS)?;
        ti.rules[i] = rule;
    }

    let random = required_group(node, "ti", "random_pulser")?;
    fill(random, "ti.random_pulser", &mut ti.random, fields::RANDOM_PULSER_FLAGS)?;
    fill(random, "ti.random_pulser", &mut ti.random, fields::RANDOM_PULSER_FIELDS)?;

    let fixed = required_group(node, "ti", "fixed_pulser")?;
    fill(fixed, "ti.fixed_pulser", &mut ti.fixed, fields::FIXED_PULSER_FLAGS)?;
    fill(fixed, "ti.fixed_pulser", &mut ti.fixed, fields::FIXED_PULSER_FIELDS)?;

    Ok(ti)
}

fn parse_helicity_decoder(node: &ConfigNode) -> Result<HelicityDecoderConfig> {
    let path = "helicity_decoder";
    let mut hd = HelicityDecoderConfig::default();
    fill(node, path, &mut hd, fields::HD_FLAGS)?;
    fill(node, path, &mut hd, fields::HD_FIELDS)?;

    // Required even when the internal generator is not selected.
    let internal = required_group(node, path, "internal_helicity")?;
    fill(
        internal,
        "helicity_decoder.internal_helicity",
        &mut hd.internal,
        fields::INTERNAL_HELICITY_FIELDS,
    )?;

    Ok(hd)
}

fn parse_digitizers(root: &ConfigNode) -> Result<DigitizerSet> {
    let list = root
        .member("fadc250")
        .and_then(ConfigNode::as_list)
        .ok_or_else(|| ConfigError::missing("fadc250"))?;
    if list.len() != DIGITIZER_COUNT {
        return Err(ConfigError::cardinality("fadc250", DIGITIZER_COUNT, list.len()));
    }

    let mut slots: [Option<DigitizerConfig>; DIGITIZER_COUNT] = [None, None];
    for (index, node) in list.iter().enumerate() {
        let record = parse_digitizer(index, node)?;
        let slot = &mut slots[record.kind.index()];
        if slot.is_some() {
            return Err(ConfigError::cardinality(
                format!("fadc250 modules of type {}", record.kind),
                1,
                2,
            ));
        }
        *slot = Some(record);
    }

    match slots {
        [Some(counting), Some(integrating)] => Ok(DigitizerSet::new(counting, integrating)),
        // Two elements with no duplicate type always fill both slots.
        _ => Err(ConfigError::cardinality("fadc250", DIGITIZER_COUNT, list.len())),
    }
}

fn parse_digitizer(index: usize, node: &ConfigNode) -> Result<DigitizerConfig> {
    let path = format!("fadc250[{index}]");
    if !node.is_group() {
        return Err(ConfigError::invalid(
            path,
            format!("expected group, found {}", node.kind()),
        ));
    }

    let type_name = node.member("type").and_then(ConfigNode::as_str);
    let kind = type_name
        .and_then(DigitizerType::parse)
        .ok_or_else(|| ConfigError::UnknownModuleType {
            index,
            value: type_name.unwrap_or("<missing>").to_string(),
        })?;

    let mut record = DigitizerConfig::zeroed(kind);
    fill(node, &path, &mut record, fields::DIGITIZER_FIELDS)?;
    record.dac = channel_array(node, &path, "dac")?;
    record.threshold = channel_array(node, &path, "threshold")?;

    debug!(index, %kind, slot = record.slot, "fadc250 parsed");
    Ok(record)
}

/// A 16-entry per-channel list.
fn channel_array(node: &ConfigNode, path: &str, name: &str) -> Result<[u32; FADC_CHANNELS]> {
    let list = required_list(node, path, name, FADC_CHANNELS)?;
    let mut values = [0u32; FADC_CHANNELS];
    for (channel, element) in list.iter().enumerate() {
        values[channel] = fields::FieldValue::from_node(
            element,
            &format!("{}[{channel}]", join(path, name)),
        )?;
    }
    Ok(values)
}
