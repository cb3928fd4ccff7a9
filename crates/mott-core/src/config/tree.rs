//! Opaque configuration tree.
//!
//! The validator never sees the file grammar. It walks a tree of groups
//! (named members), lists (ordered elements) and scalars. The TOML reader in
//! [`super::loader`] is the only producer.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Integer literal (decimal, hex, octal or binary in the source).
    Int(i64),
    /// Floating-point literal.
    Float(f64),
    /// Boolean literal.
    Bool(bool),
    /// String literal.
    Str(String),
}

impl Scalar {
    /// Short name of the scalar kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Scalar::Int(_) => "integer",
            Scalar::Float(_) => "float",
            Scalar::Bool(_) => "boolean",
            Scalar::Str(_) => "string",
        }
    }
}

/// One node of the configuration tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigNode {
    /// Named members.
    Group(BTreeMap<String, ConfigNode>),
    /// Ordered elements.
    List(Vec<ConfigNode>),
    /// Leaf value.
    Scalar(Scalar),
}

impl ConfigNode {
    /// Build a group from `(name, node)` pairs.
    pub fn group<K, I>(members: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ConfigNode)>,
    {
        ConfigNode::Group(members.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a list from nodes.
    pub fn list<I: IntoIterator<Item = ConfigNode>>(elements: I) -> Self {
        ConfigNode::List(elements.into_iter().collect())
    }

    /// Named member of a group. `None` for lists, scalars and absent names.
    pub fn member(&self, name: &str) -> Option<&ConfigNode> {
        match self {
            ConfigNode::Group(members) => members.get(name),
            _ => None,
        }
    }

    /// Element of a list by position.
    pub fn element(&self, index: usize) -> Option<&ConfigNode> {
        match self {
            ConfigNode::List(elements) => elements.get(index),
            _ => None,
        }
    }

    /// Number of members or elements; `None` for scalars.
    pub fn len(&self) -> Option<usize> {
        match self {
            ConfigNode::Group(members) => Some(members.len()),
            ConfigNode::List(elements) => Some(elements.len()),
            ConfigNode::Scalar(_) => None,
        }
    }

    /// True when a group or list has no children.
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// True for group nodes.
    pub fn is_group(&self) -> bool {
        matches!(self, ConfigNode::Group(_))
    }

    /// Elements of a list node.
    pub fn as_list(&self) -> Option<&[ConfigNode]> {
        match self {
            ConfigNode::List(elements) => Some(elements),
            _ => None,
        }
    }

    /// Scalar payload of a leaf node.
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            ConfigNode::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// String payload of a leaf node.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigNode::Scalar(Scalar::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Human-readable node kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigNode::Group(_) => "group",
            ConfigNode::List(_) => "list",
            ConfigNode::Scalar(s) => s.kind(),
        }
    }
}

impl From<u32> for ConfigNode {
    fn from(value: u32) -> Self {
        ConfigNode::Scalar(Scalar::Int(i64::from(value)))
    }
}

impl From<i64> for ConfigNode {
    fn from(value: i64) -> Self {
        ConfigNode::Scalar(Scalar::Int(value))
    }
}

impl From<bool> for ConfigNode {
    fn from(value: bool) -> Self {
        ConfigNode::Scalar(Scalar::Bool(value))
    }
}

impl From<&str> for ConfigNode {
    fn from(value: &str) -> Self {
        ConfigNode::Scalar(Scalar::Str(value.to_string()))
    }
}

impl From<toml::Value> for ConfigNode {
    fn from(value: toml::Value) -> Self {
        match value {
            toml::Value::String(s) => ConfigNode::Scalar(Scalar::Str(s)),
            toml::Value::Integer(i) => ConfigNode::Scalar(Scalar::Int(i)),
            toml::Value::Float(f) => ConfigNode::Scalar(Scalar::Float(f)),
            toml::Value::Boolean(b) => ConfigNode::Scalar(Scalar::Bool(b)),
            toml::Value::Datetime(d) => ConfigNode::Scalar(Scalar::Str(d.to_string())),
            toml::Value::Array(items) => {
                ConfigNode::List(items.into_iter().map(ConfigNode::from).collect())
            }
            toml::Value::Table(table) => ConfigNode::from(table),
        }
    }
}

impl From<toml::Table> for ConfigNode {
    fn from(table: toml::Table) -> Self {
        ConfigNode::Group(
            table
                .into_iter()
                .map(|(k, v)| (k, ConfigNode::from(v)))
                .collect(),
        )
    }
}

/// A parsed configuration: the root group plus where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigTree {
    root: ConfigNode,
    source: Option<PathBuf>,
}

impl ConfigTree {
    /// Wrap a root node that did not come from a file.
    pub fn new(root: ConfigNode) -> Self {
        Self { root, source: None }
    }

    /// Wrap a root node read from `path`.
    pub fn with_source(root: ConfigNode, path: impl Into<PathBuf>) -> Self {
        Self {
            root,
            source: Some(path.into()),
        }
    }

    /// The root group.
    pub fn root(&self) -> &ConfigNode {
        &self.root
    }

    /// The file this tree was read from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_conversion_keeps_shape() {
        let table: toml::Table = toml::from_str(
            r#"
            name = "ti"
            level = 0x10
            rules = [1, 2]
            [inner]
            on = true
            "#,
        )
        .unwrap();
        let node = ConfigNode::from(table);

        assert_eq!(node.member("name").and_then(ConfigNode::as_str), Some("ti"));
        assert_eq!(
            node.member("level").and_then(ConfigNode::as_scalar),
            Some(&Scalar::Int(16))
        );
        assert_eq!(node.member("rules").and_then(ConfigNode::len), Some(2));
        assert!(node.member("inner").is_some_and(ConfigNode::is_group));
        assert_eq!(node.member("missing"), None);
    }

    #[test]
    fn test_len_and_empty() {
        assert!(ConfigNode::group(Vec::<(String, ConfigNode)>::new()).is_empty());
        assert!(ConfigNode::list([]).is_empty());
        assert_eq!(ConfigNode::from(3u32).len(), None);
        assert!(!ConfigNode::from(3u32).is_empty());
    }

    #[test]
    fn test_member_on_non_group_is_none() {
        let list = ConfigNode::list([ConfigNode::from(1u32)]);
        assert_eq!(list.member("x"), None);
        assert_eq!(list.element(0), Some(&ConfigNode::from(1u32)));
        assert_eq!(list.element(1), None);
    }
}
