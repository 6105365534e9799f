//! Dispatch core for panel calls.
//!
//! This module provides the [`PluginService`] trait, the single surface the
//! panel calls into, and [`Dispatcher`], its implementation on top of the
//! [`Registry`].
//!
//! # Call kinds
//!
//! | call | selector | no handler |
//! |---|---|---|
//! | info | - | - |
//! | event | event type | allow with empty message |
//! | http | `METHOD:path`, then ordered scan | 404 response |
//! | schedule | schedule id | acknowledged no-op |
//! | mixin | target | `NEXT`, input untouched |
//! | shutdown | - | - |
//!
//! # Fault isolation
//!
//! Each handler runs on the blocking pool via
//! [`tokio::task::spawn_blocking`]. A returned error or a panic terminates
//! only that call: HTTP calls answer with a structured 500, the other kinds
//! fail with [`DispatchError::HandlerFault`]. The readiness gate and the
//! registry are never touched by ordinary call handling.
//!
//! ```rust,ignore
//! let registry = Arc::new(Registry::new());
//! registry.on_event("server.start", |_e: &Event| EventResult::allow());
//!
//! let dispatcher = Dispatcher::new(PluginIdentity::new("guard", "1.0.0"), registry);
//! let info = dispatcher.info().await?;
//! assert!(dispatcher.gate().is_open());
//! ```

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, debug_span, error, info, warn};

use crate::error::{DispatchError, DispatchResult, HandlerKind};
use crate::event::{Event, EventResult};
use crate::gate::ReadinessGate;
use crate::http::{Request, Response};
use crate::mixin::MixinContext;
use crate::registry::Registry;
use crate::value;
use crate::wire::{
    Ack, EventRequest, EventResponse, HttpRequest, HttpResponse, MixinRequest, MixinResponse,
    PluginInfo, ScheduleRequest,
};

// =============================================================================
// Identity
// =============================================================================

/// Declared identity of a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginIdentity {
    pub id: String,
    /// Display name, defaults to the id.
    pub name: String,
    pub version: String,
}

impl PluginIdentity {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            version: version.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

// =============================================================================
// PluginService
// =============================================================================

/// The entry points the panel calls.
///
/// Implementations must be safe to call concurrently from many in-flight
/// requests.
#[async_trait]
pub trait PluginService: Send + Sync + 'static {
    /// Identity and capabilities; the first call opens the readiness gate.
    async fn info(&self) -> DispatchResult<PluginInfo>;

    async fn event(&self, request: EventRequest) -> DispatchResult<EventResponse>;

    async fn http(&self, request: HttpRequest) -> DispatchResult<HttpResponse>;

    async fn schedule(&self, request: ScheduleRequest) -> DispatchResult<Ack>;

    async fn mixin(&self, request: MixinRequest) -> DispatchResult<MixinResponse>;

    /// Requests graceful termination; in-flight calls are not interrupted.
    async fn shutdown(&self) -> DispatchResult<Ack>;
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Routes panel calls to registered handlers.
pub struct Dispatcher {
    identity: PluginIdentity,
    registry: Arc<Registry>,
    gate: ReadinessGate,
    shutdown: CancellationToken,
}

impl Dispatcher {
    pub fn new(identity: PluginIdentity, registry: Arc<Registry>) -> Self {
        Self {
            identity,
            registry,
            gate: ReadinessGate::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Uses an externally owned shutdown token.
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn identity(&self) -> &PluginIdentity {
        &self.identity
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn gate(&self) -> &ReadinessGate {
        &self.gate
    }

    /// Token cancelled when the panel sends shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

#[async_trait]
impl PluginService for Dispatcher {
    async fn info(&self) -> DispatchResult<PluginInfo> {
        let info = PluginInfo::new(
            &self.identity.id,
            &self.identity.name,
            &self.identity.version,
            self.registry.snapshot(),
        );

        if self.gate.open() {
            info!(
                plugin = %self.identity.id,
                events = info.events.len(),
                routes = info.routes.len(),
                schedules = info.schedules.len(),
                mixins = info.mixins.len(),
                "Discovered by panel, plugin is ready"
            );
        }

        Ok(info)
    }

    async fn event(&self, request: EventRequest) -> DispatchResult<EventResponse> {
        let Some(handler) = self.registry.event_handler(&request.event_type) else {
            return Ok(EventResult::allow().into());
        };

        let selector = request.event_type.clone();
        let span = debug_span!("dispatch", kind = "event", selector = %selector);
        let event = Event::from(request);
        let result = run_isolated(HandlerKind::Event, &selector, move || handler.call(&event))
            .instrument(span)
            .await?;

        if !result.allow {
            debug!(event = %selector, message = %result.message, "Event blocked");
        }
        Ok(result.into())
    }

    async fn http(&self, request: HttpRequest) -> DispatchResult<HttpResponse> {
        let Some((route, handler)) = self.registry.match_route(&request.method, &request.path)
        else {
            debug!(method = %request.method, path = %request.path, "No route matched");
            return Ok(Response::error(404, "not found").into());
        };

        let selector = format!("{} {}", route.method, route.path);
        let span = debug_span!("dispatch", kind = "http", selector = %selector);
        let request = Request::from(request);
        let outcome = run_isolated(HandlerKind::Route, &selector, move || {
            handler.call(&request)
        })
        .instrument(span)
        .await;

        let response = outcome.unwrap_or_else(|e| Response::error(500, e.to_string()));
        Ok(response.into())
    }

    async fn schedule(&self, request: ScheduleRequest) -> DispatchResult<Ack> {
        let Some(handler) = self.registry.schedule_handler(&request.schedule_id) else {
            debug!(schedule = %request.schedule_id, "No handler for schedule, ignoring");
            return Ok(Ack::default());
        };

        let span = debug_span!("dispatch", kind = "schedule", selector = %request.schedule_id);
        run_isolated(HandlerKind::Schedule, &request.schedule_id, move || {
            handler.call()
        })
        .instrument(span)
        .await?;
        Ok(Ack::default())
    }

    async fn mixin(&self, request: MixinRequest) -> DispatchResult<MixinResponse> {
        let Some(handler) = self.registry.mixin_handler(&request.target) else {
            return Ok(MixinResponse::transparent());
        };

        let MixinRequest {
            target,
            request_id,
            input,
            chain_data,
        } = request;
        let input = value::decode_object(&input)
            .map_err(|e| DispatchError::malformed(&target, "input", e))?;
        let chain_data = value::decode_object(&chain_data)
            .map_err(|e| DispatchError::malformed(&target, "chain_data", e))?;

        let span = debug_span!("dispatch", kind = "mixin", selector = %target, request_id = %request_id);
        let mut ctx = MixinContext::new(target.clone(), request_id, input, chain_data);
        let result = run_isolated(HandlerKind::Mixin, &target, move || handler.call(&mut ctx))
            .instrument(span)
            .await?;

        debug!(mixin = %target, action = ?result.action(), "Mixin hop complete");
        Ok(MixinResponse::encode(&result)?)
    }

    async fn shutdown(&self) -> DispatchResult<Ack> {
        if self.shutdown.is_cancelled() {
            warn!("Shutdown requested again, already shutting down");
        } else {
            info!(plugin = %self.identity.id, "Shutdown requested by panel");
            self.shutdown.cancel();
        }
        Ok(Ack::default())
    }
}

// =============================================================================
// Fault isolation
// =============================================================================

/// Runs a handler on the blocking pool, turning errors and panics into a
/// [`DispatchError::HandlerFault`].
async fn run_isolated<T, F>(kind: HandlerKind, selector: &str, f: F) -> DispatchResult<T>
where
    F: FnOnce() -> Result<T, String> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(message)) => {
            warn!(kind = %kind, selector, error = %message, "Handler returned an error");
            Err(DispatchError::fault(kind, selector, message))
        }
        Err(join) if join.is_panic() => {
            let message = panic_message(join.into_panic());
            error!(kind = %kind, selector, panic = %message, "Handler panicked");
            Err(DispatchError::fault(kind, selector, message))
        }
        Err(join) => Err(DispatchError::fault(kind, selector, join.to_string())),
    }
}

/// Extracts a readable message from a panic payload.
pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        return (*msg).to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "handler panicked".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixin::{MixinAction, MixinResult};
    use serde_json::{Value, json};
    use std::collections::HashMap;

    fn dispatcher(registry: Registry) -> Dispatcher {
        Dispatcher::new(PluginIdentity::new("test", "0.1.0"), Arc::new(registry))
    }

    fn mixin_request(target: &str, input: Value) -> MixinRequest {
        MixinRequest {
            target: target.to_string(),
            request_id: "req-1".to_string(),
            input: input.to_string(),
            chain_data: String::new(),
        }
    }

    fn decode(text: &Option<String>) -> Value {
        serde_json::from_str(text.as_deref().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_info_reports_identity_and_opens_gate() {
        let registry = Registry::new();
        registry.on_event("server.start", |_e: &Event| EventResult::allow());
        registry.mixin("server.create", 3, |ctx: &mut MixinContext| ctx.next());
        let dispatcher = Dispatcher::new(
            PluginIdentity::new("guard", "1.2.0").with_name("Server Guard"),
            Arc::new(registry),
        );

        assert!(!dispatcher.gate().is_open());
        let info = dispatcher.info().await.unwrap();
        assert!(dispatcher.gate().is_open());

        assert_eq!(info.id, "guard");
        assert_eq!(info.name, "Server Guard");
        assert_eq!(info.events, vec!["server.start"]);
        assert_eq!(info.mixins[0].priority, 3);

        // Later calls still answer with fresh info.
        dispatcher
            .registry()
            .on_event("server.stop", |_e: &Event| EventResult::allow());
        let info = dispatcher.info().await.unwrap();
        assert_eq!(info.events.len(), 2);
    }

    #[tokio::test]
    async fn test_event_without_handler_allows() {
        let dispatcher = dispatcher(Registry::new());
        let resp = dispatcher
            .event(EventRequest {
                event_type: "x".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(resp.allow);
        assert_eq!(resp.message, "");
    }

    #[tokio::test]
    async fn test_suspend_blocked_unless_forced() {
        let registry = Registry::new();
        registry.on_event("server.suspend", |e: &Event| {
            if e.get("force") == Some("true") {
                EventResult::allow()
            } else {
                EventResult::block("suspension requires force=true")
            }
        });
        let dispatcher = dispatcher(registry);

        let request = |force: &str| EventRequest {
            event_type: "server.suspend".into(),
            data: HashMap::from([("force".to_string(), force.to_string())]),
            sync: true,
        };

        let blocked = dispatcher.event(request("false")).await.unwrap();
        assert!(!blocked.allow);
        assert!(!blocked.message.is_empty());

        let allowed = dispatcher.event(request("true")).await.unwrap();
        assert!(allowed.allow);
    }

    #[tokio::test]
    async fn test_http_unmatched_is_404() {
        let registry = Registry::new();
        registry.route("GET", "/files/*", |_r: &Request| Response::text("file"));
        let dispatcher = dispatcher(registry);

        let resp = dispatcher
            .http(HttpRequest {
                method: "GET".into(),
                path: "/file".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(resp.status, 404);
        let body: Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(body, json!({ "success": false, "error": "not found" }));

        let resp = dispatcher
            .http(HttpRequest {
                method: "GET".into(),
                path: "/files/a/b".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, b"file");
    }

    #[tokio::test]
    async fn test_http_handler_sees_request() {
        let registry = Registry::new();
        registry.route("POST", "/echo", |r: &Request| {
            Response::json(json!({ "user": r.user_id, "body": r.text() }))
        });
        let dispatcher = dispatcher(registry);

        let resp = dispatcher
            .http(HttpRequest {
                method: "POST".into(),
                path: "/echo".into(),
                body: b"ping".to_vec(),
                user_id: "u-1".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(body["data"], json!({ "user": "u-1", "body": "ping" }));
    }

    #[tokio::test]
    async fn test_http_fault_becomes_500() {
        let registry = Registry::new();
        registry.route("GET", "/boom", |_r: &Request| -> Response { panic!("kaboom") });
        registry.route("GET", "/err", |_r: &Request| -> Result<Response, String> {
            Err("bad state".into())
        });
        let dispatcher = dispatcher(registry);

        for path in ["/boom", "/err"] {
            let resp = dispatcher
                .http(HttpRequest {
                    method: "GET".into(),
                    path: path.into(),
                    ..Default::default()
                })
                .await
                .unwrap();
            assert_eq!(resp.status, 500);
        }

        // A faulting call leaves the dispatcher usable.
        assert!(dispatcher.info().await.is_ok());
    }

    #[tokio::test]
    async fn test_schedule_absent_and_present() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let fired = Arc::new(AtomicUsize::new(0));
        let registry = Registry::new();
        {
            let fired = Arc::clone(&fired);
            registry.schedule("cleanup", "*/5 * * * *", move || {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }
        let dispatcher = dispatcher(registry);

        dispatcher
            .schedule(ScheduleRequest {
                schedule_id: "unknown".into(),
            })
            .await
            .unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        dispatcher
            .schedule(ScheduleRequest {
                schedule_id: "cleanup".into(),
            })
            .await
            .unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_schedule_fault_is_reported() {
        let registry = Registry::new();
        registry.schedule("fail", "* * * * *", || -> Result<(), String> {
            Err("db unavailable".into())
        });
        let dispatcher = dispatcher(registry);

        let err = dispatcher
            .schedule(ScheduleRequest {
                schedule_id: "fail".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::HandlerFault {
                kind: HandlerKind::Schedule,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_mixin_unregistered_target_is_transparent() {
        let dispatcher = dispatcher(Registry::new());
        // Malformed input is never decoded without a handler.
        let resp = dispatcher
            .mixin(MixinRequest {
                target: "server.create".into(),
                input: "{not json".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(resp.action, MixinAction::Next);
        assert!(resp.modified_input.is_none());
    }

    #[tokio::test]
    async fn test_mixin_uppercases_name() {
        let registry = Registry::new();
        registry.mixin("server.create", 0, |ctx: &mut MixinContext| {
            let name = ctx.get_str("name").to_uppercase();
            ctx.set("name", name);
            ctx.next()
        });
        let dispatcher = dispatcher(registry);

        let resp = dispatcher
            .mixin(mixin_request("server.create", json!({ "name": "abc" })))
            .await
            .unwrap();

        assert_eq!(resp.action, MixinAction::Next);
        assert_eq!(decode(&resp.modified_input), json!({ "name": "ABC" }));
    }

    #[tokio::test]
    async fn test_mixin_next_without_set_omits_modified_input() {
        let registry = Registry::new();
        registry.mixin("server.create", 0, |ctx: &mut MixinContext| ctx.next());
        let dispatcher = dispatcher(registry);

        let resp = dispatcher
            .mixin(mixin_request("server.create", json!({ "name": "abc" })))
            .await
            .unwrap();
        let encoded = serde_json::to_value(&resp).unwrap();
        assert!(encoded.get("modified_input").is_none());
    }

    #[tokio::test]
    async fn test_mixin_return_and_error() {
        let registry = Registry::new();
        registry.mixin("a", 0, |ctx: &mut MixinContext| ctx.return_value(42));
        registry.mixin("b", 0, |ctx: &mut MixinContext| {
            ctx.return_value(json!({ "a": 1 }))
        });
        registry.mixin("c", 0, |ctx: &mut MixinContext| {
            ctx.notify("Denied", "Not today", "error");
            ctx.error("boom")
        });
        let dispatcher = dispatcher(registry);

        let resp = dispatcher.mixin(mixin_request("a", json!({}))).await.unwrap();
        assert_eq!(resp.action, MixinAction::Return);
        assert_eq!(decode(&resp.output), json!({ "result": 42 }));

        let resp = dispatcher.mixin(mixin_request("b", json!({}))).await.unwrap();
        assert_eq!(decode(&resp.output), json!({ "a": 1 }));

        let resp = dispatcher.mixin(mixin_request("c", json!({}))).await.unwrap();
        assert_eq!(resp.action, MixinAction::Error);
        assert_eq!(resp.error.as_deref(), Some("boom"));
        assert_eq!(resp.notifications[0].title, "Denied");
    }

    #[tokio::test]
    async fn test_mixin_reads_chain_data() {
        let registry = Registry::new();
        registry.mixin("server.create", 0, |ctx: &mut MixinContext| {
            let seen = ctx.chain("audited").and_then(Value::as_bool).unwrap_or(false);
            ctx.return_value(seen)
        });
        let dispatcher = dispatcher(registry);

        let mut request = mixin_request("server.create", json!({}));
        request.chain_data = json!({ "audited": true }).to_string();
        let resp = dispatcher.mixin(request).await.unwrap();
        assert_eq!(decode(&resp.output), json!({ "result": true }));
    }

    #[tokio::test]
    async fn test_mixin_malformed_payload() {
        let registry = Registry::new();
        registry.mixin("server.create", 0, |ctx: &mut MixinContext| ctx.next());
        let dispatcher = dispatcher(registry);

        let err = dispatcher
            .mixin(MixinRequest {
                target: "server.create".into(),
                input: "[1, 2]".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(err.is_malformed());

        let err = dispatcher
            .mixin(MixinRequest {
                target: "server.create".into(),
                input: "{}".into(),
                chain_data: "{oops".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::MalformedPayload {
                field: "chain_data",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_mixin_panic_is_isolated() {
        let registry = Registry::new();
        registry.mixin("server.create", 0, |_ctx: &mut MixinContext| -> MixinResult {
            panic!("handler bug")
        });
        let dispatcher = dispatcher(registry);

        let err = dispatcher
            .mixin(mixin_request("server.create", json!({})))
            .await
            .unwrap_err();
        match err {
            DispatchError::HandlerFault { message, .. } => assert_eq!(message, "handler bug"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_info_opens_gate_once() {
        let dispatcher = Arc::new(dispatcher(Registry::new()));
        let waiter = {
            let gate = dispatcher.gate().clone();
            tokio::spawn(async move { gate.wait().await })
        };

        let calls: Vec<_> = (0..16)
            .map(|_| {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move { dispatcher.info().await })
            })
            .collect();
        for call in calls {
            call.await.unwrap().unwrap();
        }

        waiter.await.unwrap();
        assert!(dispatcher.gate().is_open());
        assert!(!dispatcher.gate().open());
    }

    #[tokio::test]
    async fn test_shutdown_cancels_token() {
        let dispatcher = dispatcher(Registry::new());
        let token = dispatcher.shutdown_token();
        assert!(!token.is_cancelled());

        dispatcher.shutdown().await.unwrap();
        assert!(token.is_cancelled());
        dispatcher.shutdown().await.unwrap();
    }
}
