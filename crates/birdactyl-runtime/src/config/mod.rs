//! Configuration for the plugin runtime.
//!
//! Settings are layered with figment (defaults, programmatic merges, config
//! files, `BIRDACTYL_*` environment variables) and then overridden by the
//! launch arguments the panel passes on the command line.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    LogFormat, LogLevel, LogOutput, LoggingConfig, PanelConfig, RuntimeConfig, ServerConfig,
    SpanEventConfig, StorageConfig,
};
pub use validation::validate_config;
