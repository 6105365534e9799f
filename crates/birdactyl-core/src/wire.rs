//! Wire messages of the plugin protocol.
//!
//! Every call is a JSON request/response pair. Binary fields (HTTP bodies)
//! travel as base64 strings; mixin payloads travel as serialized JSON text so
//! they stay opaque until a handler actually needs them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::event::{Event, EventResult};
use crate::http::{Request, Response};
use crate::mixin::{MixinAction, MixinResult, Notification};
use crate::registry::{MixinInfo, RegistrySnapshot, ScheduleInfo};
use crate::routing::RouteInfo;
use crate::value;

/// Serde adapter encoding byte buffers as standard base64.
pub mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text.as_bytes()).map_err(D::Error::custom)
    }
}

/// Empty acknowledgment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {}

// ─── Info ─────────────────────────────────────────────────────────────────────

/// Identity and declared capabilities of the plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub routes: Vec<RouteInfo>,
    #[serde(default)]
    pub schedules: Vec<ScheduleInfo>,
    #[serde(default)]
    pub mixins: Vec<MixinInfo>,
}

impl PluginInfo {
    pub fn new(id: &str, name: &str, version: &str, snapshot: RegistrySnapshot) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            events: snapshot.events,
            routes: snapshot.routes,
            schedules: snapshot.schedules,
            mixins: snapshot.mixins,
        }
    }
}

// ─── Event ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRequest {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: HashMap<String, String>,
    #[serde(default)]
    pub sync: bool,
}

impl From<EventRequest> for Event {
    fn from(req: EventRequest) -> Self {
        Event::new(req.event_type, req.data, req.sync)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventResponse {
    pub allow: bool,
    #[serde(default)]
    pub message: String,
}

impl From<EventResult> for EventResponse {
    fn from(result: EventResult) -> Self {
        Self {
            allow: result.allow,
            message: result.message,
        }
    }
}

// ─── HTTP ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub query: HashMap<String, String>,
    #[serde(default, with = "base64_bytes")]
    pub body: Vec<u8>,
    #[serde(default)]
    pub user_id: String,
}

impl From<HttpRequest> for Request {
    fn from(req: HttpRequest) -> Self {
        Request {
            method: req.method,
            path: req.path,
            headers: req.headers,
            query: req.query,
            body: req.body,
            user_id: req.user_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default, with = "base64_bytes")]
    pub body: Vec<u8>,
}

impl From<Response> for HttpResponse {
    fn from(resp: Response) -> Self {
        Self {
            status: resp.status,
            headers: resp.headers,
            body: resp.body,
        }
    }
}

// ─── Schedule ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub schedule_id: String,
}

// ─── Mixin ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixinRequest {
    pub target: String,
    #[serde(default)]
    pub request_id: String,
    /// Serialized input object.
    #[serde(default)]
    pub input: String,
    /// Serialized chain data; empty on the first hop.
    #[serde(default)]
    pub chain_data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixinResponse {
    pub action: MixinAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub notifications: Vec<Notification>,
}

impl MixinResponse {
    /// `NEXT` with nothing attached.
    pub fn transparent() -> Self {
        Self {
            action: MixinAction::Next,
            modified_input: None,
            output: None,
            error: None,
            notifications: Vec::new(),
        }
    }

    /// Encodes a handler decision.
    pub fn encode(result: &MixinResult) -> serde_json::Result<Self> {
        let mut resp = Self::transparent();
        resp.action = result.action();
        match result.action() {
            MixinAction::Next => {
                resp.modified_input = result
                    .modified_input()
                    .map(value::encode_object)
                    .transpose()?;
            }
            MixinAction::Return => {
                resp.output = result.output().map(value::encode_object).transpose()?;
            }
            MixinAction::Error => {
                resp.error = Some(result.error().to_string());
            }
        }
        resp.notifications = result.notifications().to_vec();
        Ok(resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_http_body_is_base64() {
        let resp = HttpResponse::from(Response::text("hi"));
        let encoded = serde_json::to_value(&resp).unwrap();
        assert_eq!(encoded["body"], "aGk=");

        let decoded: HttpRequest = serde_json::from_value(json!({
            "method": "POST",
            "path": "/echo",
            "body": "aGk=",
        }))
        .unwrap();
        assert_eq!(decoded.body, b"hi");
        assert!(decoded.headers.is_empty());
    }

    #[test]
    fn test_transparent_mixin_response_omits_payloads() {
        let encoded = serde_json::to_value(MixinResponse::transparent()).unwrap();
        assert_eq!(encoded, json!({ "action": "NEXT", "notifications": [] }));
    }

    #[test]
    fn test_event_request_field_names() {
        let req: EventRequest = serde_json::from_value(json!({
            "type": "server.suspend",
            "data": { "force": "false" },
            "sync": true,
        }))
        .unwrap();
        let event = Event::from(req);
        assert_eq!(event.event_type(), "server.suspend");
        assert_eq!(event.get("force"), Some("false"));
        assert!(event.is_sync());
    }

    #[test]
    fn test_plugin_info_shape() {
        let info = PluginInfo::new("guard", "Guard", "1.0.0", RegistrySnapshot::default());
        let encoded: Value = serde_json::to_value(&info).unwrap();
        assert_eq!(encoded["id"], "guard");
        assert_eq!(encoded["mixins"], json!([]));
    }
}
