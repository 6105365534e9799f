//! # Birdactyl
//!
//! Write plugins for the Birdactyl game-server panel in Rust.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────┐  info/event/http/   ┌────────────┐     ┌──────────┐
//! │ Panel │────schedule/mixin──▶│ Dispatcher │────▶│ Registry │──▶ your handlers
//! │       │◀───panel API────────│  (plugin)  │     └──────────┘
//! └───────┘                     └────────────┘
//! ```
//!
//! - **Runtime**: serves the plugin protocol and runs the lifecycle
//! - **Dispatcher**: routes each panel call to a handler, isolating faults
//! - **Registry**: event, route, schedule and mixin handlers
//! - **Panel client**: typed calls back into the panel
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use birdactyl::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     Plugin::new("hello", "1.0.0")
//!         .get("/hello", |_req: &Request| Response::json(json!({ "hello": "world" })))
//!         .on_event("server.start", |e: &Event| {
//!             println!("server {} started", e.get("server_id").unwrap_or("?"));
//!             EventResult::allow()
//!         })
//!         .start()
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use birdactyl_core as core;
pub use birdactyl_runtime as runtime;
pub use birdactyl_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use birdactyl::prelude::*;
/// ```
pub mod prelude {
    // Plugin builder - main entry point
    pub use birdactyl_runtime::{HotConfig, Plugin, PluginContext};

    // Handler inputs and outputs
    pub use birdactyl_core::{Event, EventResult, Request, Response};

    // Mixins
    pub use birdactyl_core::{Mixin, MixinContext, MixinResult, Notification, targets};

    // Panel access
    pub use birdactyl_transport::{BlockingPanelClient, PanelClient};

    pub use serde_json::json;
}
