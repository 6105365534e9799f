//! Birdactyl Runtime - Lifecycle layer for Birdactyl panel plugins.
//!
//! This crate provides:
//! - The plugin builder and its context (`Plugin`, `PluginContext`)
//! - Runtime orchestration (`PluginRuntime`, `PluginHandle`)
//! - Layered configuration and launch arguments
//! - Logging configuration
//! - Live-reloading YAML files (`HotConfig`)
//!
//! ```ignore
//! use birdactyl_runtime::Plugin;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     Plugin::new("server-guard", "1.0.0")
//!         .on_event("server.suspend", |e: &Event| EventResult::allow())
//!         .on_start(|ctx: &PluginContext| info!(plugin = ctx.plugin_id(), "Guard online"))
//!         .start()
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! # Lifecycle
//!
//! The protocol server starts before the panel knows about the plugin. The
//! first info call opens the readiness gate, after which the `on_start`
//! callback runs exactly once. A shutdown call from the panel, Ctrl+C or
//! SIGTERM stops the server after in-flight calls finish.

pub mod cli;
pub mod config;
pub mod error;
pub mod hot_config;
pub mod logging;
pub mod plugin;
pub mod runtime;

// Re-exports
pub use cli::CliArgs;
pub use config::{ConfigError, ConfigLoader, ConfigResult, RuntimeConfig};
pub use error::{HotConfigError, HotConfigResult, RuntimeError, RuntimeResult};
pub use hot_config::HotConfig;
pub use logging::init_from_config;
pub use plugin::{Plugin, PluginContext};
pub use runtime::{PluginHandle, PluginRuntime, RuntimeBuilder, wait_for_shutdown};
