//! Inbound protocol server.
//!
//! The panel drives a plugin by POSTing JSON to a fixed set of endpoints:
//!
//! ```text
//! 0.0.0.0:50051
//! ├── POST /plugin/info      → PluginService::info
//! ├── POST /plugin/event     → PluginService::event
//! ├── POST /plugin/http      → PluginService::http
//! ├── POST /plugin/schedule  → PluginService::schedule
//! ├── POST /plugin/mixin     → PluginService::mixin
//! └── POST /plugin/shutdown  → PluginService::shutdown
//! ```
//!
//! Protocol failures come back as `{"error": "..."}` with status 400 for
//! malformed payloads and 500 for handler faults. Handler-level HTTP errors
//! are not protocol failures: they travel inside a normal `HttpResponse`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use birdactyl_core::wire::{
    Ack, EventRequest, EventResponse, HttpRequest, HttpResponse, MixinRequest, MixinResponse,
    PluginInfo, ScheduleRequest,
};
use birdactyl_core::{DispatchError, PluginService};

use crate::error::{TransportError, TransportResult};

type SharedService = Arc<dyn PluginService>;

// ─── Protocol errors ──────────────────────────────────────────────────────────

/// A failed protocol call, rendered as `{"error": message}`.
#[derive(Debug)]
pub struct ProtocolError {
    status: StatusCode,
    message: String,
}

impl ProtocolError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<DispatchError> for ProtocolError {
    fn from(err: DispatchError) -> Self {
        let status = if err.is_malformed() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ProtocolError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = self.status.as_u16(), error = %self.message, "Protocol call failed");
        } else {
            warn!(status = self.status.as_u16(), error = %self.message, "Protocol call rejected");
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ProtocolResult<T> = Result<Json<T>, ProtocolError>;

/// Decodes a request body without insisting on a content type.
fn decode_body<T: DeserializeOwned>(call: &str, body: &Bytes) -> Result<T, ProtocolError> {
    serde_json::from_slice(body)
        .map_err(|e| ProtocolError::bad_request(format!("invalid {call} request: {e}")))
}

fn reply<T: Serialize>(value: T) -> ProtocolResult<T> {
    Ok(Json(value))
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Builds the axum [`Router`] serving the plugin protocol for `service`.
pub fn router(service: SharedService) -> Router {
    Router::new()
        .route("/plugin/info", post(info))
        .route("/plugin/event", post(event))
        .route("/plugin/http", post(http))
        .route("/plugin/schedule", post(schedule))
        .route("/plugin/mixin", post(mixin))
        .route("/plugin/shutdown", post(shutdown))
        .with_state(service)
}

async fn info(State(service): State<SharedService>) -> ProtocolResult<PluginInfo> {
    reply(service.info().await?)
}

async fn event(State(service): State<SharedService>, body: Bytes) -> ProtocolResult<EventResponse> {
    let request: EventRequest = decode_body("event", &body)?;
    reply(service.event(request).await?)
}

async fn http(State(service): State<SharedService>, body: Bytes) -> ProtocolResult<HttpResponse> {
    let request: HttpRequest = decode_body("http", &body)?;
    reply(service.http(request).await?)
}

async fn schedule(State(service): State<SharedService>, body: Bytes) -> ProtocolResult<Ack> {
    let request: ScheduleRequest = decode_body("schedule", &body)?;
    reply(service.schedule(request).await?)
}

async fn mixin(State(service): State<SharedService>, body: Bytes) -> ProtocolResult<MixinResponse> {
    let request: MixinRequest = decode_body("mixin", &body)?;
    reply(service.mixin(request).await?)
}

async fn shutdown(State(service): State<SharedService>) -> ProtocolResult<Ack> {
    reply(service.shutdown().await?)
}

// ─── Serving ──────────────────────────────────────────────────────────────────

/// A running protocol server.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    task: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    /// The address the OS actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Waits for the serve loop to finish draining.
    pub async fn join(self) -> TransportResult<()> {
        let result = self.task.await.map_err(std::io::Error::other)?;
        result.map_err(TransportError::from)
    }
}

/// Binds `addr` and serves the protocol until `shutdown` is cancelled.
///
/// In-flight calls are allowed to finish after cancellation.
pub async fn serve(
    addr: &str,
    service: SharedService,
    shutdown: CancellationToken,
) -> TransportResult<ServerHandle> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    let local_addr = listener.local_addr()?;
    let app = router(service);

    info!(addr = %local_addr, "Plugin protocol server listening");

    let task = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await;
        debug!(addr = %local_addr, "Plugin protocol server stopped");
        result
    });

    Ok(ServerHandle { local_addr, task })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use birdactyl_core::{
        Dispatcher, Event, EventResult, MixinContext, PluginIdentity, Registry, Response as Reply,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    fn app() -> Router {
        let registry = Arc::new(Registry::new());
        registry.on_event("server.suspend", |e: &Event| {
            if e.get("force") == Some("true") {
                EventResult::allow()
            } else {
                EventResult::block("suspension requires force")
            }
        });
        registry.route("GET", "/hello", |_r: &birdactyl_core::Request| {
            Reply::text("hi")
        });
        registry.mixin("server.create", 0, |ctx: &mut MixinContext| {
            let name = ctx.get_str("name").to_uppercase();
            ctx.set("name", name);
            ctx.next()
        });
        registry.schedule("boom", "* * * * *", || -> Result<(), String> {
            Err("schedule exploded".into())
        });
        let dispatcher = Dispatcher::new(PluginIdentity::new("guard", "1.0.0"), registry);
        router(Arc::new(dispatcher))
    }

    async fn call(app: Router, path: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_info_without_body() {
        let request = Request::builder()
            .method("POST")
            .uri("/plugin/info")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let info: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(info["id"], "guard");
        assert_eq!(info["events"], json!(["server.suspend"]));
        assert_eq!(info["routes"], json!([{ "method": "GET", "path": "/hello" }]));
    }

    #[tokio::test]
    async fn test_event_round_trip() {
        let (status, body) = call(
            app(),
            "/plugin/event",
            json!({ "type": "server.suspend", "data": { "force": "false" }, "sync": true }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["allow"], false);
        assert!(!body["message"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_http_body_is_base64() {
        let (status, body) = call(
            app(),
            "/plugin/http",
            json!({ "method": "GET", "path": "/hello" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], 200);
        assert_eq!(body["body"], "aGk=");

        let (_, missing) = call(
            app(),
            "/plugin/http",
            json!({ "method": "GET", "path": "/nope" }),
        )
        .await;
        assert_eq!(missing["status"], 404);
    }

    #[tokio::test]
    async fn test_mixin_round_trip() {
        let (status, body) = call(
            app(),
            "/plugin/mixin",
            json!({ "target": "server.create", "input": r#"{"name":"abc"}"# }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["action"], "NEXT");
        let modified: Value =
            serde_json::from_str(body["modified_input"].as_str().unwrap()).unwrap();
        assert_eq!(modified, json!({ "name": "ABC" }));
    }

    #[tokio::test]
    async fn test_malformed_mixin_input_is_400() {
        let (status, body) = call(
            app(),
            "/plugin/mixin",
            json!({ "target": "server.create", "input": "{not json" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_unparseable_request_is_400() {
        let request = Request::builder()
            .method("POST")
            .uri("/plugin/event")
            .body(Body::from("garbage"))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_schedule_fault_is_500() {
        let (status, body) = call(app(), "/plugin/schedule", json!({ "schedule_id": "boom" })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("schedule exploded"));
    }

    #[tokio::test]
    async fn test_serve_stops_on_cancel() {
        let registry = Arc::new(Registry::new());
        let dispatcher = Dispatcher::new(PluginIdentity::new("guard", "1.0.0"), registry);
        let token = CancellationToken::new();

        let handle = serve("127.0.0.1:0", Arc::new(dispatcher), token.clone())
            .await
            .unwrap();
        assert_ne!(handle.local_addr().port(), 0);

        token.cancel();
        handle.join().await.unwrap();
    }
}
