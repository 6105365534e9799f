//! Plugin builder and the context handed to startup code and handlers.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use birdactyl_core::{
    Event, EventResult, IntoOutcome, Mixin, MixinContext, MixinResult, PluginIdentity, Registry,
    Request, Response,
};
use birdactyl_transport::{BlockingPanelClient, ConsoleStreamBuilder, PanelClient};

use crate::error::{RuntimeError, RuntimeResult};
use crate::runtime::PluginRuntime;

pub(crate) type StartFn = Box<dyn FnOnce(&PluginContext) -> Result<(), String> + Send>;

// =============================================================================
// PluginContext
// =============================================================================

struct ContextInner {
    plugin_id: String,
    registry: Arc<Registry>,
    data_dir_enabled: AtomicBool,
    panel: OnceLock<PanelClient>,
    blocking: OnceLock<BlockingPanelClient>,
    data_dir: OnceLock<PathBuf>,
}

/// Runtime services available to a plugin.
///
/// Obtain it from [`Plugin::context`] before starting and move clones into
/// handler closures. Panel access and the data directory become available
/// once the runtime has launched the plugin.
#[derive(Clone)]
pub struct PluginContext {
    inner: Arc<ContextInner>,
}

impl PluginContext {
    fn new(plugin_id: &str, registry: Arc<Registry>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                plugin_id: plugin_id.to_string(),
                registry,
                data_dir_enabled: AtomicBool::new(false),
                panel: OnceLock::new(),
                blocking: OnceLock::new(),
                data_dir: OnceLock::new(),
            }),
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.inner.plugin_id
    }

    /// The live registry; handlers registered here are visible to the next call.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    /// Blocking panel client, for use inside handler bodies.
    pub fn api(&self) -> RuntimeResult<&BlockingPanelClient> {
        self.inner
            .blocking
            .get()
            .ok_or(RuntimeError::NotStarted("panel client"))
    }

    /// Async panel client.
    pub fn async_api(&self) -> RuntimeResult<&PanelClient> {
        self.inner
            .panel
            .get()
            .ok_or(RuntimeError::NotStarted("panel client"))
    }

    /// Starts building a console stream for `server_id`.
    pub fn console(&self, server_id: impl Into<String>) -> RuntimeResult<ConsoleStreamBuilder> {
        Ok(self.async_api()?.console(server_id))
    }

    /// The plugin's private data directory.
    pub fn data_dir(&self) -> RuntimeResult<&Path> {
        if !self.data_dir_enabled() {
            return Err(RuntimeError::DataDirDisabled);
        }
        self.inner
            .data_dir
            .get()
            .map(PathBuf::as_path)
            .ok_or(RuntimeError::NotStarted("data directory"))
    }

    /// `name` resolved inside the data directory.
    pub fn data_path(&self, name: impl AsRef<Path>) -> RuntimeResult<PathBuf> {
        Ok(self.data_dir()?.join(name))
    }

    pub(crate) fn data_dir_enabled(&self) -> bool {
        self.inner.data_dir_enabled.load(Ordering::Acquire)
    }

    fn enable_data_dir(&self) {
        self.inner.data_dir_enabled.store(true, Ordering::Release);
    }

    pub(crate) fn attach(&self, panel: PanelClient, blocking: BlockingPanelClient, data_dir: Option<PathBuf>) {
        let _ = self.inner.panel.set(panel);
        let _ = self.inner.blocking.set(blocking);
        if let Some(dir) = data_dir {
            let _ = self.inner.data_dir.set(dir);
        }
    }
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("plugin_id", &self.inner.plugin_id)
            .field("started", &self.inner.panel.get().is_some())
            .field("data_dir", &self.inner.data_dir.get())
            .finish()
    }
}

// =============================================================================
// Plugin
// =============================================================================

/// A plugin under construction.
///
/// ```rust,ignore
/// Plugin::new("server-guard", "1.0.0")
///     .name("Server Guard")
///     .on_event("server.suspend", |e: &Event| EventResult::allow())
///     .get("/status", |_req: &Request| Response::json(json!({ "ok": true })))
///     .mixin(targets::SERVER_CREATE, |ctx: &mut MixinContext| ctx.next())
///     .start()
///     .await
/// ```
#[must_use]
pub struct Plugin {
    identity: PluginIdentity,
    registry: Arc<Registry>,
    context: PluginContext,
    on_start: Option<StartFn>,
}

impl Plugin {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        let identity = PluginIdentity::new(id, version);
        let registry = Arc::new(Registry::new());
        let context = PluginContext::new(&identity.id, Arc::clone(&registry));
        Self {
            identity,
            registry,
            context,
            on_start: None,
        }
    }

    /// Display name reported to the panel (defaults to the id).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.identity = self.identity.with_name(name);
        self
    }

    /// Requests a private data directory, created at launch.
    pub fn use_data_dir(self) -> Self {
        self.context.enable_data_dir();
        self
    }

    /// Runs once, after the panel first asks for the plugin's info.
    ///
    /// The callback runs on the blocking pool; an error or panic is logged
    /// and does not stop the plugin.
    pub fn on_start<F, R>(mut self, f: F) -> Self
    where
        F: FnOnce(&PluginContext) -> R + Send + 'static,
        R: IntoOutcome<()>,
    {
        self.on_start = Some(Box::new(move |ctx: &PluginContext| f(ctx).into_outcome()));
        self
    }

    pub fn on_event<F, R>(self, event_type: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Event) -> R + Send + Sync + 'static,
        R: IntoOutcome<EventResult>,
    {
        self.registry.on_event(event_type, handler);
        self
    }

    /// Registers a route. `method` may be `*`; `path` may end in `*`.
    pub fn route<F, R>(self, method: &str, path: &str, handler: F) -> Self
    where
        F: Fn(&Request) -> R + Send + Sync + 'static,
        R: IntoOutcome<Response>,
    {
        self.registry.route(method, path, handler);
        self
    }

    pub fn get<F, R>(self, path: &str, handler: F) -> Self
    where
        F: Fn(&Request) -> R + Send + Sync + 'static,
        R: IntoOutcome<Response>,
    {
        self.route("GET", path, handler)
    }

    pub fn post<F, R>(self, path: &str, handler: F) -> Self
    where
        F: Fn(&Request) -> R + Send + Sync + 'static,
        R: IntoOutcome<Response>,
    {
        self.route("POST", path, handler)
    }

    pub fn put<F, R>(self, path: &str, handler: F) -> Self
    where
        F: Fn(&Request) -> R + Send + Sync + 'static,
        R: IntoOutcome<Response>,
    {
        self.route("PUT", path, handler)
    }

    pub fn delete<F, R>(self, path: &str, handler: F) -> Self
    where
        F: Fn(&Request) -> R + Send + Sync + 'static,
        R: IntoOutcome<Response>,
    {
        self.route("DELETE", path, handler)
    }

    /// Registers a scheduled task. The panel owns the cron timing.
    pub fn schedule<F, R>(self, id: impl Into<String>, cron: impl Into<String>, handler: F) -> Self
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: IntoOutcome<()>,
    {
        self.registry.schedule(id, cron, handler);
        self
    }

    pub fn mixin<F, R>(self, target: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut MixinContext) -> R + Send + Sync + 'static,
        R: IntoOutcome<MixinResult>,
    {
        self.mixin_with_priority(target, 0, handler)
    }

    /// Registers a mixin with an ordering hint for the panel's chain.
    pub fn mixin_with_priority<F, R>(self, target: impl Into<String>, priority: i32, handler: F) -> Self
    where
        F: Fn(&mut MixinContext) -> R + Send + Sync + 'static,
        R: IntoOutcome<MixinResult>,
    {
        self.registry.mixin(target, priority, handler);
        self
    }

    /// Registers a type implementing [`Mixin`].
    pub fn register_mixin<M: Mixin>(self, mixin: M) -> Self {
        self.registry.register_mixin(mixin);
        self
    }

    pub fn identity(&self) -> &PluginIdentity {
        &self.identity
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// A handle to the context, usable from handlers once started.
    pub fn context(&self) -> PluginContext {
        self.context.clone()
    }

    /// Loads configuration from the environment and launch arguments, then
    /// serves the panel until shutdown.
    pub async fn start(self) -> RuntimeResult<()> {
        PluginRuntime::new().run(self).await
    }

    pub(crate) fn into_parts(self) -> (PluginIdentity, Arc<Registry>, PluginContext, Option<StartFn>) {
        (self.identity, self.registry, self.context, self.on_start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_registers_into_registry() {
        let plugin = Plugin::new("guard", "1.0.0")
            .name("Guard")
            .on_event("server.stop", |_e: &Event| EventResult::allow())
            .get("/status", |_r: &Request| Response::text("ok"))
            .delete("/cache/*", |_r: &Request| Response::new(204))
            .schedule("cleanup", "0 * * * *", || ())
            .mixin_with_priority("server.create", 10, |ctx: &mut MixinContext| ctx.next());

        assert_eq!(plugin.identity().name, "Guard");
        let snapshot = plugin.registry().snapshot();
        assert_eq!(snapshot.events, vec!["server.stop"]);
        assert_eq!(snapshot.routes.len(), 2);
        assert_eq!(snapshot.routes[1].method, "DELETE");
        assert_eq!(snapshot.schedules[0].cron, "0 * * * *");
        assert_eq!(snapshot.mixins[0].priority, 10);
    }

    #[test]
    fn test_context_before_start() {
        let plugin = Plugin::new("guard", "1.0.0");
        let ctx = plugin.context();

        assert!(matches!(ctx.api(), Err(RuntimeError::NotStarted(_))));
        assert!(matches!(ctx.data_dir(), Err(RuntimeError::DataDirDisabled)));

        let ctx = plugin.use_data_dir().context();
        assert!(matches!(ctx.data_dir(), Err(RuntimeError::NotStarted(_))));
    }

    #[test]
    fn test_context_sees_late_registration() {
        let plugin = Plugin::new("guard", "1.0.0");
        let ctx = plugin.context();
        ctx.registry()
            .on_event("server.start", |_e: &Event| EventResult::allow());
        assert_eq!(plugin.registry().snapshot().events, vec!["server.start"]);
    }
}
