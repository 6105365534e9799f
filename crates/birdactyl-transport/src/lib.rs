//! # Birdactyl Transport
//!
//! Network layer between a plugin and the panel.
//!
//! ## Features
//!
//! - `server` (default): axum server exposing the plugin protocol
//! - `client` (default): reqwest panel API client and console streaming
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐        POST /plugin/*         ┌──────────────┐
//! │        panel         │ ─────────────────────────────▶│   server     │──▶ PluginService
//! │                      │◀───────────────────────────── │  (axum)      │    (birdactyl-core)
//! │                      │                               └──────────────┘
//! │                      │     POST /plugin-api/{method}  ┌──────────────┐
//! │                      │◀────────────────────────────── │ PanelClient  │◀── handlers
//! └──────────────────────┘                                │ (reqwest)    │
//!                                                         └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use birdactyl_transport::server;
//!
//! let token = CancellationToken::new();
//! let handle = server::serve("0.0.0.0:50051", Arc::new(dispatcher), token.clone()).await?;
//! // ...
//! token.cancel();
//! handle.join().await?;
//! ```

pub mod error;

#[cfg(feature = "client")]
pub mod client;
#[cfg(feature = "client")]
pub mod console;
#[cfg(feature = "client")]
pub mod model;
#[cfg(feature = "server")]
pub mod server;

pub use error::{TransportError, TransportResult};

#[cfg(feature = "client")]
pub use client::{BlockingPanelClient, PanelClient};
#[cfg(feature = "client")]
pub use console::{ConsoleStream, ConsoleStreamBuilder};
#[cfg(feature = "server")]
pub use server::{ServerHandle, serve};
