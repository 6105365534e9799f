//! Plugin lifecycle.
//!
//! ```text
//! launch ──▶ serving ──▶ first info call ──▶ on_start (once) ──▶ ...
//!                                                    │
//!       shutdown call / Ctrl+C / SIGTERM / custom future ──▶ drain ──▶ stopped
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use birdactyl_runtime::{Plugin, PluginRuntime};
//!
//! // Config from birdactyl.toml, BIRDACTYL_* and the launch arguments
//! PluginRuntime::new().run(plugin).await?;
//!
//! // Custom configuration
//! let runtime = PluginRuntime::builder()
//!     .config_file("config/birdactyl.toml")
//!     .profile("production")
//!     .build()?;
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use birdactyl_core::{Dispatcher, ReadinessGate, panic_message};
use birdactyl_transport::{BlockingPanelClient, PanelClient, ServerHandle, serve};

use crate::cli::CliArgs;
use crate::config::{ConfigLoader, ConfigResult, RuntimeConfig, validate_config};
use crate::error::RuntimeResult;
use crate::logging;
use crate::plugin::{Plugin, PluginContext, StartFn};

/// Launches plugins with a resolved configuration.
#[derive(Debug, Clone)]
pub struct PluginRuntime {
    config: RuntimeConfig,
}

impl Default for PluginRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginRuntime {
    /// Resolves configuration from files, `BIRDACTYL_*` variables and the
    /// process arguments, then initializes logging.
    ///
    /// Falls back to defaults plus launch arguments if configuration fails
    /// to load or validate.
    pub fn new() -> Self {
        let (args, ignored) = CliArgs::from_env_lenient();

        let runtime = Self::builder()
            .args(args.clone())
            .build()
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                let mut config = RuntimeConfig::default();
                args.apply(&mut config);
                Self::from_config(config)
            });

        if let Some(e) = ignored {
            warn!(error = %e, "Ignoring unparseable launch arguments");
        }
        runtime
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from an already resolved configuration and
    /// initializes logging from it.
    pub fn from_config(config: RuntimeConfig) -> Self {
        logging::init_from_config(&config.logging);

        info!(
            panel = %config.panel.address,
            bind = %config.server.bind_addr(),
            log_level = %config.logging.level,
            "Runtime initialized from configuration"
        );

        Self { config }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Where `plugin_id` keeps its data.
    pub fn data_dir_for(&self, plugin_id: &str) -> PathBuf {
        let dir = format!("{plugin_id}_data");
        match &self.config.storage.root {
            Some(root) => root.join(dir),
            None => PathBuf::from(dir),
        }
    }

    /// Binds the protocol server and wires the plugin's context.
    ///
    /// Must be called within a tokio runtime; the blocking panel client is
    /// bound to the current one.
    pub async fn launch(&self, plugin: Plugin) -> RuntimeResult<PluginHandle> {
        let (identity, registry, context, on_start) = plugin.into_parts();

        let panel = PanelClient::new(
            &self.config.panel.address,
            &identity.id,
            self.config.panel.timeout(),
        )?;
        let blocking = BlockingPanelClient::new(panel.clone(), Handle::current());

        let data_dir = if context.data_dir_enabled() {
            let dir = self.data_dir_for(&identity.id);
            tokio::fs::create_dir_all(&dir).await?;
            debug!(path = %dir.display(), "Data directory ready");
            Some(dir)
        } else {
            None
        };
        context.attach(panel, blocking, data_dir);

        let token = CancellationToken::new();
        let dispatcher = Dispatcher::new(identity.clone(), registry).with_shutdown_token(token.clone());
        let gate = dispatcher.gate().clone();

        let server = serve(
            &self.config.server.bind_addr(),
            Arc::new(dispatcher),
            token.clone(),
        )
        .await?;

        info!(
            plugin = %identity.id,
            version = %identity.version,
            addr = %server.local_addr(),
            "Plugin serving, waiting for the panel"
        );

        Ok(PluginHandle {
            plugin_id: identity.id,
            context,
            gate,
            token,
            server,
            on_start,
        })
    }

    /// Launches the plugin and serves until a shutdown call or signal.
    pub async fn run(&self, plugin: Plugin) -> RuntimeResult<()> {
        self.launch(plugin).await?.run_until(wait_for_shutdown()).await
    }
}

// =============================================================================
// PluginHandle
// =============================================================================

/// A launched plugin.
pub struct PluginHandle {
    plugin_id: String,
    context: PluginContext,
    gate: ReadinessGate,
    token: CancellationToken,
    server: ServerHandle,
    on_start: Option<StartFn>,
}

impl PluginHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn context(&self) -> &PluginContext {
        &self.context
    }

    /// True once the panel has made its first info call.
    pub fn is_ready(&self) -> bool {
        self.gate.is_open()
    }

    /// Cancelling this token stops the plugin.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Serves until the panel calls shutdown or `shutdown` completes, then
    /// drains in-flight calls.
    pub async fn run_until<F>(self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let startup = spawn_startup(
            self.gate.clone(),
            self.token.clone(),
            self.context.clone(),
            self.on_start,
        );

        tokio::select! {
            () = shutdown => info!(plugin = %self.plugin_id, "Shutdown requested locally"),
            () = self.token.cancelled() => info!(plugin = %self.plugin_id, "Shutdown requested by panel"),
        }

        self.token.cancel();
        startup.abort();
        self.server.join().await?;

        info!(plugin = %self.plugin_id, "Plugin stopped");
        Ok(())
    }
}

/// Waits for the gate, then runs the startup callback once on the blocking pool.
fn spawn_startup(
    gate: ReadinessGate,
    token: CancellationToken,
    context: PluginContext,
    on_start: Option<StartFn>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            () = gate.wait() => {}
            () = token.cancelled() => return,
        }
        info!(plugin = %context.plugin_id(), "Panel connected, plugin ready");

        let Some(f) = on_start else {
            return;
        };
        match tokio::task::spawn_blocking(move || f(&context)).await {
            Ok(Ok(())) => debug!("Startup callback finished"),
            Ok(Err(e)) => error!(error = %e, "Startup callback failed"),
            Err(e) if e.is_panic() => {
                error!(panic = %panic_message(e.into_panic()), "Startup callback panicked");
            }
            Err(e) => warn!(error = %e, "Startup callback cancelled"),
        }
    })
}

/// Waits for Ctrl+C or SIGTERM.
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            error!(error = %e, "Failed to listen for Ctrl+C, waiting for a shutdown call");
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`PluginRuntime`] with custom configuration sources.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    args: CliArgs,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            args: CliArgs::default(),
        }
    }

    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    pub fn merge(mut self, config: RuntimeConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Launch arguments; they override every other source.
    pub fn args(mut self, args: CliArgs) -> Self {
        self.args = args;
        self
    }

    /// Loads, applies launch arguments, validates, and builds the runtime.
    pub fn build(self) -> ConfigResult<PluginRuntime> {
        let mut loader = self.config_loader;
        if let Some(path) = &self.args.config {
            loader = loader.file(path);
        }
        if let Some(profile) = &self.args.profile {
            loader = loader.profile(profile);
        }

        let mut config = loader.load()?;
        self.args.apply(&mut config);
        validate_config(&config)?;

        Ok(PluginRuntime::from_config(config))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use birdactyl_core::{Event, EventResult};

    use crate::config::ServerConfig;
    use crate::error::RuntimeError;

    fn local_config() -> RuntimeConfig {
        RuntimeConfig {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 0,
            },
            ..Default::default()
        }
    }

    async fn post(addr: SocketAddr, call: &str) -> reqwest::StatusCode {
        reqwest::Client::new()
            .post(format!("http://{addr}/plugin/{call}"))
            .send()
            .await
            .unwrap()
            .status()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_startup_runs_once_then_panel_shutdown() {
        let started = Arc::new(AtomicUsize::new(0));
        let plugin = Plugin::new("guard", "1.0.0")
            .on_event("server.stop", |_e: &Event| EventResult::allow())
            .on_start({
                let started = Arc::clone(&started);
                move |ctx: &PluginContext| {
                    assert!(ctx.api().is_ok());
                    started.fetch_add(1, Ordering::SeqCst);
                }
            });

        let handle = PluginRuntime::from_config(local_config())
            .launch(plugin)
            .await
            .unwrap();
        let addr = handle.local_addr();
        let running = tokio::spawn(handle.run_until(std::future::pending()));

        let calls: Vec<_> = (0..8).map(|_| tokio::spawn(post(addr, "info"))).collect();
        for call in calls {
            assert!(call.await.unwrap().is_success());
        }

        tokio::time::timeout(Duration::from_secs(5), async {
            while started.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert!(post(addr, "shutdown").await.is_success());
        tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_startup_failure_does_not_stop_plugin() {
        let plugin = Plugin::new("guard", "1.0.0")
            .on_start(|_ctx: &PluginContext| -> Result<(), String> { Err("no panel".into()) });

        let handle = PluginRuntime::from_config(local_config())
            .launch(plugin)
            .await
            .unwrap();
        let addr = handle.local_addr();
        let token = handle.shutdown_token();
        let running = tokio::spawn(handle.run_until(std::future::pending()));

        assert!(post(addr, "info").await.is_success());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!running.is_finished());

        token.cancel();
        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_local_shutdown_future() {
        let handle = PluginRuntime::from_config(local_config())
            .launch(Plugin::new("guard", "1.0.0"))
            .await
            .unwrap();
        assert!(!handle.is_ready());

        handle
            .run_until(tokio::time::sleep(Duration::from_millis(10)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_data_dir_created_under_root() {
        let root = tempfile::tempdir().unwrap();
        let mut config = local_config();
        config.storage.root = Some(root.path().to_path_buf());

        let plugin = Plugin::new("guard", "1.0.0").use_data_dir();
        let handle = PluginRuntime::from_config(config)
            .launch(plugin)
            .await
            .unwrap();

        let expected = root.path().join("guard_data");
        assert!(expected.is_dir());
        assert_eq!(handle.context().data_dir().unwrap(), expected);
        assert_eq!(
            handle.context().data_path("state.yaml").unwrap(),
            expected.join("state.yaml")
        );

        handle.shutdown_token().cancel();
        handle.run_until(std::future::pending()).await.unwrap();
    }

    #[tokio::test]
    async fn test_data_dir_not_created_unless_requested() {
        let root = tempfile::tempdir().unwrap();
        let mut config = local_config();
        config.storage.root = Some(root.path().to_path_buf());

        let handle = PluginRuntime::from_config(config)
            .launch(Plugin::new("guard", "1.0.0"))
            .await
            .unwrap();
        assert!(!root.path().join("guard_data").exists());
        assert!(matches!(
            handle.context().data_dir(),
            Err(RuntimeError::DataDirDisabled)
        ));

        handle
            .run_until(async {})
            .await
            .unwrap();
    }

    #[test]
    fn test_builder_applies_launch_args_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let (args, _) = CliArgs::parse_lenient(["plugin", "6001", "/srv/data"]);
        let runtime = PluginRuntime::builder()
            .search_path(dir.path())
            .without_env()
            .args(args)
            .build()
            .unwrap();
        assert_eq!(runtime.config().server.port, 6001);
        assert_eq!(
            runtime.data_dir_for("guard"),
            PathBuf::from("/srv/data/guard_data")
        );

        let mut bad = RuntimeConfig::default();
        bad.panel.address = "ftp://panel".into();
        assert!(
            PluginRuntime::builder()
                .search_path(dir.path())
                .without_env()
                .merge(bad)
                .build()
                .is_err()
        );
    }
}
