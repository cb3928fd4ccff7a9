//! Holder of the current run configuration.
//!
//! The store is the single owner of the active [`RunConfiguration`]. A load
//! validates the whole tree first and only then swaps the stored value, so a
//! rejected file leaves the previous configuration in place.

use super::schema::{DigitizerConfig, DigitizerType, RunConfiguration};
use super::tree::ConfigTree;
use super::validator::validate;
use crate::error::Result;
use tracing::{debug, info, warn};

/// Current configuration plus a counter of successful loads.
#[derive(Debug, Default)]
pub struct ConfigStore {
    current: Option<RunConfiguration>,
    generation: u64,
}

impl ConfigStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `tree` and make it the current configuration.
    ///
    /// On error nothing changes.
    pub fn load(&mut self, tree: &ConfigTree) -> Result<&RunConfiguration> {
        let run = match validate(tree) {
            Ok(run) => run,
            Err(e) => {
                warn!(
                    keeping_generation = self.generation,
                    "Configuration rejected, keeping previous: {e}"
                );
                return Err(e);
            }
        };
        Ok(self.replace(run))
    }

    /// Store an already validated configuration.
    pub fn replace(&mut self, run: RunConfiguration) -> &RunConfiguration {
        self.generation += 1;
        info!(generation = self.generation, "Run configuration stored");
        for (name, value) in run.parameters() {
            debug!(parameter = %name, value, "config");
        }
        self.current.insert(run)
    }

    /// The stored configuration, if any load has succeeded.
    pub fn current(&self) -> Option<&RunConfiguration> {
        self.current.as_ref()
    }

    /// Digitizer record of the stored configuration.
    pub fn digitizer(&self, kind: DigitizerType) -> Option<&DigitizerConfig> {
        self.current.as_ref().map(|run| run.digitizer(kind))
    }

    /// Number of successful loads so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Forget the stored configuration.
    pub fn clear(&mut self) {
        if self.current.take().is_some() {
            debug!(generation = self.generation, "Run configuration cleared");
        }
    }

    /// Flattened parameter listing of the stored configuration.
    pub fn parameters(&self) -> Vec<(String, u64)> {
        self.current
            .as_ref()
            .map(RunConfiguration::parameters)
            .unwrap_or_default()
    }
}
