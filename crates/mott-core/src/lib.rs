//! `mott-core`
//!
//! Configuration side of the Mott polarimeter readout controller: the
//! configuration tree, its validator, the typed run configuration and the
//! store that holds it between runs.
//!
//! ## Example
//!
//! ```rust,no_run
//! use mott_core::config::{load_config_tree, ConfigStore, DigitizerType};
//! use std::path::Path;
//!
//! # fn example() -> mott_core::Result<()> {
//! let tree = load_config_tree(Path::new("config/uitf_mott.toml"))?;
//! let mut store = ConfigStore::new();
//! let run = store.load(&tree)?;
//! println!("counting fADC in slot {}", run.digitizer(DigitizerType::Counting).slot);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;

pub use error::{ConfigError, Result};
