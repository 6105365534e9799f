//! Server Guard
//!
//! A small plugin showing each kind of handler:
//!
//! - a mixin on `server.create` enforcing a memory cap and normalizing names
//! - a [`Mixin`] type auditing `server.delete`
//! - a sync event handler that blocks suspension unless forced
//! - routes, including a wildcard
//! - a schedule reporting the server count
//! - a live-reloading `config.yaml` in the plugin's data directory
//!
//! # Usage
//!
//! ```bash
//! cargo run --package server-guard -- 50051 /srv/birdactyl/plugins
//! ```

use std::sync::{Arc, OnceLock};

use anyhow::Result;
use birdactyl::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct GuardConfig {
    max_memory_mb: i64,
    uppercase_names: bool,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_memory_mb: 8192,
            uppercase_names: true,
        }
    }
}

type SharedConfig = Arc<OnceLock<HotConfig<GuardConfig>>>;

fn current(config: &SharedConfig) -> Arc<GuardConfig> {
    config
        .get()
        .map(HotConfig::get)
        .unwrap_or_else(|| Arc::new(GuardConfig::default()))
}

// ============================================================================
// Mixins
// ============================================================================

fn guard_create(config: &SharedConfig, ctx: &mut MixinContext) -> MixinResult {
    let limits = current(config);

    let memory = ctx.get_int("memory");
    if memory > limits.max_memory_mb {
        return ctx.error(format!(
            "memory {memory} MB exceeds the {} MB limit",
            limits.max_memory_mb
        ));
    }

    if limits.uppercase_names {
        let name = ctx.get_str("name").to_uppercase();
        ctx.set("name", name);
    }
    ctx.next()
}

/// Records who deletes servers, without changing the outcome.
struct DeleteAudit;

impl Mixin for DeleteAudit {
    const TARGET: &'static str = targets::SERVER_DELETE;
    const PRIORITY: i32 = -10;

    fn handle(&self, ctx: &mut MixinContext) -> MixinResult {
        let server_id = ctx.get_str("id").to_string();
        info!(server = %server_id, request = ctx.request_id(), "Server deletion");
        ctx.notify("Audit", format!("Deletion of {server_id} was recorded"), "info");
        ctx.next()
    }
}

// ============================================================================
// Events and routes
// ============================================================================

fn guard_suspend(event: &Event) -> EventResult {
    if event.get("force") == Some("true") {
        return EventResult::allow();
    }
    EventResult::block(format!(
        "server {} is protected; retry with force=true",
        event.get("server_id").unwrap_or("?")
    ))
}

fn server_info(ctx: &PluginContext, req: &Request) -> Result<Response> {
    let id = req.path.trim_start_matches("/servers/");
    if id.is_empty() {
        return Ok(Response::error(400, "missing server id"));
    }
    let server = ctx.api()?.get_server(id)?;
    Ok(Response::json(server))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config: SharedConfig = Arc::default();

    let plugin = Plugin::new("server-guard", "0.1.0")
        .name("Server Guard")
        .use_data_dir();
    let ctx = plugin.context();

    plugin
        .mixin_with_priority(targets::SERVER_CREATE, 10, {
            let config = Arc::clone(&config);
            move |mixin: &mut MixinContext| guard_create(&config, mixin)
        })
        .register_mixin(DeleteAudit)
        .on_event("server.suspend", guard_suspend)
        .get("/status", {
            let config = Arc::clone(&config);
            move |_req: &Request| {
                let limits = current(&config);
                Response::json(json!({
                    "ok": true,
                    "max_memory_mb": limits.max_memory_mb,
                }))
            }
        })
        .get("/servers/*", {
            let ctx = ctx.clone();
            move |req: &Request| server_info(&ctx, req)
        })
        .schedule("report", "*/5 * * * *", {
            let ctx = ctx.clone();
            move || -> Result<()> {
                let count = ctx.api()?.list_servers()?.len();
                info!(servers = count, "Periodic report");
                Ok(())
            }
        })
        .on_start(move |ctx: &PluginContext| -> Result<()> {
            let guard = HotConfig::open(ctx.data_path("config.yaml")?, GuardConfig::default())?
                .on_change(|c: &GuardConfig| info!(max_memory_mb = c.max_memory_mb, "Limits changed"));
            guard.watch(HotConfig::<GuardConfig>::DEFAULT_INTERVAL);
            if config.set(guard).is_err() {
                warn!("Config was already loaded");
            }

            ctx.api()?.log("info", "Server Guard is watching")?;
            Ok(())
        })
        .start()
        .await?;

    Ok(())
}
