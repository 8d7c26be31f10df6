//! KDL configuration parsing for hoover.
//!
//! This crate handles parsing of:
//! - Registry connection settings
//! - Retention policy, protected tags and exclusions
//! - Concurrency, logging and report settings
//! - Command-line overrides on top of the file

pub mod cleanup;
pub mod error;

pub use cleanup::{
    CleanupConfig, ConcurrencySettings, LogFormat, LoggingSettings, Overrides, RegistrySettings,
    ReportSettings, Secret, load_config, parse_config, parse_config_with_env,
};
pub use error::{ConfigError, ConfigResult};
