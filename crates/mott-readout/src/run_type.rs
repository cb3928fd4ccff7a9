//! Counting / integrating run selection.

use mott_core::config::{DigitizerConfig, DigitizerType, RunConfiguration};
use mott_hardware::TriggerSource;
use std::fmt;
use std::str::FromStr;
use tracing::error;

/// Which measurement a run takes. Chosen at download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunType {
    /// Pulse counting; triggers from the front-panel TS inputs.
    #[default]
    Counting,
    /// Charge integrating; triggers from the front-panel TRG input.
    Integrating,
}

impl RunType {
    /// Parse the run-control user string.
    ///
    /// An empty string selects counting; an unknown one is logged and also
    /// selects counting.
    pub fn from_user_string(user: &str) -> Self {
        let user = user.trim();
        if user.is_empty() {
            return Self::Counting;
        }
        user.parse().unwrap_or_else(|_| {
            error!("ERROR: Invalid runtype ({user}).  Default to counting");
            Self::Counting
        })
    }

    /// TI trigger input for this run type.
    pub fn trigger_source(self) -> TriggerSource {
        match self {
            Self::Counting => TriggerSource::FrontPanelTs,
            Self::Integrating => TriggerSource::FrontPanelTrg,
        }
    }

    /// The digitizer read out in this run type.
    pub fn digitizer(self) -> DigitizerType {
        match self {
            Self::Counting => DigitizerType::Counting,
            Self::Integrating => DigitizerType::Integrating,
        }
    }

    /// Configuration records of the digitizers read out in this run type.
    pub fn active_digitizers(self, run: &RunConfiguration) -> Vec<&DigitizerConfig> {
        run.fadc250
            .iter()
            .filter(|d| d.kind == self.digitizer())
            .collect()
    }

    /// OR of `1 << slot` over the active digitizers.
    pub fn enabled_mask(self, run: &RunConfiguration) -> u32 {
        self.active_digitizers(run)
            .iter()
            .fold(0, |mask, d| mask | d.slot_mask())
    }

    /// Lower-case name.
    pub fn as_str(self) -> &'static str {
        self.digitizer().as_str()
    }
}

impl FromStr for RunType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match DigitizerType::parse(s.trim()) {
            Some(DigitizerType::Counting) => Ok(Self::Counting),
            Some(DigitizerType::Integrating) => Ok(Self::Integrating),
            None => Err(format!("unknown run type '{s}'")),
        }
    }
}

impl fmt::Display for RunType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mott_core::config::DigitizerSet;
    use tracing_test::traced_test;

    #[test]
    fn test_user_string_case_insensitive() {
        assert_eq!(RunType::from_user_string("Integrating"), RunType::Integrating);
        assert_eq!(RunType::from_user_string("COUNTING"), RunType::Counting);
        assert_eq!(RunType::from_user_string(""), RunType::Counting);
    }

    #[test]
    #[traced_test]
    fn test_unknown_user_string_falls_back() {
        assert_eq!(RunType::from_user_string("beam"), RunType::Counting);
        assert!(logs_contain("Invalid runtype (beam)"));
    }

    #[test]
    fn test_trigger_source() {
        assert_eq!(RunType::Counting.trigger_source(), TriggerSource::FrontPanelTs);
        assert_eq!(RunType::Integrating.trigger_source(), TriggerSource::FrontPanelTrg);
    }

    #[test]
    fn test_enabled_mask_follows_run_type() {
        let mut counting = DigitizerConfig::zeroed(DigitizerType::Counting);
        counting.slot = 4;
        let mut integrating = DigitizerConfig::zeroed(DigitizerType::Integrating);
        integrating.slot = 6;
        let run = RunConfiguration {
            fadc250: DigitizerSet::new(counting, integrating),
            ..Default::default()
        };

        assert_eq!(RunType::Counting.enabled_mask(&run), 1 << 4);
        assert_eq!(RunType::Integrating.enabled_mask(&run), 1 << 6);
        assert_eq!(RunType::Integrating.active_digitizers(&run)[0].slot, 6);
    }
}
