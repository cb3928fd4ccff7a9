//! Readout configuration.
//!
//! - [`tree`]: grammar-free tree of groups, lists and scalars
//! - [`loader`]: TOML file → tree
//! - [`validator`]: tree → [`RunConfiguration`]
//! - [`store`]: the current configuration, replaced only by a successful load

pub mod fields;
pub mod loader;
pub mod schema;
pub mod store;
pub mod tree;
pub mod validator;

pub use loader::{load_config_tree, parse_config_str};
pub use schema::{
    DigitizerConfig, DigitizerSet, DigitizerType, FixedPulser, HelicityDecoderConfig,
    InternalHelicityConfig, ProcessingParams, RandomPulser, RunConfiguration,
    TriggerInterfaceConfig, TriggerRule, FADC_CHANNELS, TRIGGER_RULE_COUNT,
};
pub use store::ConfigStore;
pub use tree::{ConfigNode, ConfigTree, Scalar};
pub use validator::{validate, DIGITIZER_COUNT};
