//! Reading configuration trees from TOML.
//!
//! # Usage
//!
//! ```rust,ignore
//! use mott_core::config::loader::load_config_tree;
//! use std::path::Path;
//!
//! let tree = load_config_tree(Path::new("config/uitf_mott.toml"))?;
//! let run = mott_core::config::validate(&tree)?;
//! ```

use super::tree::{ConfigNode, ConfigTree};
use crate::error::{ConfigError, Result};
use std::path::Path;
use tracing::{debug, info};

/// Load a configuration tree from a TOML file.
///
/// Read failures become [`ConfigError::Io`]; syntax errors become
/// [`ConfigError::Parse`] carrying the file path and the 1-based line.
pub fn load_config_tree(path: &Path) -> Result<ConfigTree> {
    debug!("Loading readout config from: {}", path.display());

    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let root = parse_root(&text, &path.display().to_string())?;

    info!(path = %path.display(), "Loaded readout config");
    Ok(ConfigTree::with_source(root, path))
}

/// Parse a configuration tree from TOML text.
///
/// Useful for tests and for configurations embedded in other documents.
pub fn parse_config_str(text: &str) -> Result<ConfigTree> {
    parse_root(text, "<string>").map(ConfigTree::new)
}

fn parse_root(text: &str, origin: &str) -> Result<ConfigNode> {
    let table: toml::Table = text.parse().map_err(|e: toml::de::Error| {
        let line = e
            .span()
            .map(|span| line_of(text, span.start))
            .unwrap_or(0);
        ConfigError::Parse {
            path: origin.to_string(),
            line,
            reason: e.message().trim().to_string(),
        }
    })?;
    Ok(ConfigNode::from(table))
}

/// 1-based line containing byte `offset`.
fn line_of(text: &str, offset: usize) -> usize {
    let end = offset.min(text.len());
    text.as_bytes()[..end].iter().filter(|b| **b == b'\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_str() {
        let tree = parse_config_str("[ti]\nblocklevel = 1\n").unwrap();
        assert!(tree.root().member("ti").is_some());
        assert!(tree.source().is_none());
    }

    #[test]
    fn test_parse_error_reports_line() {
        let text = "[ti]\nblocklevel = 1\nprescale = = 3\nbufferlevel = 2\n";
        let err = parse_config_str(text).unwrap_err();
        match err {
            ConfigError::Parse { path, line, reason } => {
                assert_eq!(path, "<string>");
                assert_eq!(line, 3);
                assert!(!reason.is_empty());
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[helicity_decoder]\nenabled = true").unwrap();

        let tree = load_config_tree(file.path()).unwrap();
        assert_eq!(tree.source(), Some(file.path()));
        assert!(tree.root().member("helicity_decoder").is_some());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = load_config_tree(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("absent.toml"));
    }

    #[test]
    fn test_line_of() {
        assert_eq!(line_of("a\nb\nc", 0), 1);
        assert_eq!(line_of("a\nb\nc", 2), 2);
        assert_eq!(line_of("a\nb\nc", 100), 3);
    }
}
