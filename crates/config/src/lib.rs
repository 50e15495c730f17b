// Run configuration loading

pub mod ai;
pub mod error;
pub mod settings;

pub use ai::{get_api_key, KeyLookup, KeySource, ResolvedClassifierConfig};
pub use error::ConfigError;
pub use settings::{
    ClassifierSettings, ColumnRule, OutputSettings, ProductSource, Provider, ReferenceSource,
    RunConfig,
};
