//! Runtime error types.

use std::path::PathBuf;

use thiserror::Error;

use birdactyl_transport::TransportError;

pub use crate::config::{ConfigError, ConfigResult};

/// Errors that can occur while launching or running a plugin.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A context accessor was used before the runtime provided the value.
    #[error("{0} is not available until the plugin has started")]
    NotStarted(&'static str),

    /// The plugin did not opt into a data directory.
    #[error("data directory is disabled; call Plugin::use_data_dir() to enable it")]
    DataDirDisabled,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors raised by [`HotConfig`](crate::hot_config::HotConfig).
#[derive(Error, Debug)]
pub enum HotConfigError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl HotConfigError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn yaml(path: &std::path::Path, source: serde_yaml::Error) -> Self {
        Self::Yaml {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type HotConfigResult<T> = Result<T, HotConfigError>;
