//! Per-call view handed to mixin handlers.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::result::{MixinResult, Notification};
use crate::value::{self, Payload};

/// State of a single mixin hop.
///
/// Created fresh for each call and consumed by exactly one handler
/// invocation. `input` is never mutated; [`set`](Self::set) writes into a
/// lazily created copy that is reported back on `NEXT`.
#[derive(Debug, Clone, Default)]
pub struct MixinContext {
    target: String,
    request_id: String,
    input: Payload,
    chain_data: Payload,
    modified_input: Option<Payload>,
    notifications: Vec<Notification>,
}

impl MixinContext {
    pub fn new(
        target: impl Into<String>,
        request_id: impl Into<String>,
        input: Payload,
        chain_data: Payload,
    ) -> Self {
        Self {
            target: target.into(),
            request_id: request_id.into(),
            input,
            chain_data,
            modified_input: None,
            notifications: Vec::new(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// The input as received by this hop.
    pub fn input(&self) -> &Payload {
        &self.input
    }

    /// Pipeline state carried by the panel across hops.
    pub fn chain_data(&self) -> &Payload {
        &self.chain_data
    }

    /// The input with this hop's writes applied.
    pub fn effective_input(&self) -> &Payload {
        self.modified_input.as_ref().unwrap_or(&self.input)
    }

    pub fn is_modified(&self) -> bool {
        self.modified_input.is_some()
    }

    // ─── Reads ────────────────────────────────────────────────────────────────

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.input.get(key)
    }

    pub fn get_str(&self, key: &str) -> &str {
        value::coerce_str(self.input.get(key))
    }

    pub fn get_int(&self, key: &str) -> i64 {
        value::coerce_int(self.input.get(key))
    }

    pub fn get_bool(&self, key: &str) -> bool {
        value::coerce_bool(self.input.get(key))
    }

    /// Deserializes an input value, `None` if absent or of another shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        value::coerce_as(self.input.get(key))
    }

    pub fn chain(&self, key: &str) -> Option<&Value> {
        self.chain_data.get(key)
    }

    // ─── Writes ───────────────────────────────────────────────────────────────

    /// Overrides an input key for the next hop.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.modified_input
            .get_or_insert_with(|| self.input.clone())
            .insert(key.into(), value.into());
    }

    /// Attaches an advisory notification to whatever decision follows.
    pub fn notify(
        &mut self,
        title: impl Into<String>,
        message: impl Into<String>,
        kind: impl Into<String>,
    ) {
        self.notifications
            .push(Notification::new(title, message, kind));
    }

    // ─── Terminal decisions ───────────────────────────────────────────────────

    /// Continues the pipeline, forwarding any writes made through `set`.
    pub fn next(&mut self) -> MixinResult {
        MixinResult::next(self.modified_input.take()).with_notifications(self.take_notifications())
    }

    /// Stops the pipeline with a final answer.
    ///
    /// Objects are used verbatim; anything else is wrapped as
    /// `{"result": value}`.
    pub fn return_value(&mut self, data: impl Into<Value>) -> MixinResult {
        MixinResult::returning(data.into()).with_notifications(self.take_notifications())
    }

    /// Aborts the pipeline.
    pub fn error(&mut self, message: impl Into<String>) -> MixinResult {
        MixinResult::failed(message.into()).with_notifications(self.take_notifications())
    }

    fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }
}
