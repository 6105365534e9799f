//! HTTP-style request and response views for plugin routes.
//!
//! The panel proxies requests addressed to a plugin and forwards them as
//! [`Request`]s; route handlers answer with a [`Response`].
//!
//! ```rust,ignore
//! plugin.route("GET", "/stats", |req: &Request| {
//!     let limit = req.query_param("limit").unwrap_or("10");
//!     Response::json(json!({ "limit": limit }))
//! });
//! ```

use std::collections::HashMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;

pub const CONTENT_TYPE: &str = "Content-Type";

/// A read-only view of a proxied HTTP request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Vec<u8>,
    /// Identity of the panel user making the request, empty for anonymous calls.
    pub user_id: String,
}

impl Request {
    /// Returns a header value, matching the name case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    /// The body as UTF-8 text, with invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Response returned from a route handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Response {
    /// Creates a response with the given status and no body.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// `200` with `{"success": true, "data": ...}`.
    pub fn json<T: Serialize>(data: T) -> Self {
        let data = serde_json::to_value(data).unwrap_or_default();
        Self::json_body(200, &json!({ "success": true, "data": data }))
    }

    /// An error status with `{"success": false, "error": ...}`.
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self::json_body(status, &json!({ "success": false, "error": message.into() }))
    }

    /// `200` with a plain text body.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(200)
            .with_header(CONTENT_TYPE, "text/plain")
            .with_body(text.into().into_bytes())
    }

    /// `200` with an HTML body.
    pub fn html(html: impl Into<String>) -> Self {
        Self::new(200)
            .with_header(CONTENT_TYPE, "text/html; charset=utf-8")
            .with_body(html.into().into_bytes())
    }

    /// `200` with raw bytes and an explicit content type.
    pub fn bytes(content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self::new(200)
            .with_header(CONTENT_TYPE, content_type)
            .with_body(body)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    fn json_body(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status)
            .with_header(CONTENT_TYPE, "application/json")
            .with_body(value.to_string().into_bytes())
    }
}
