//! Panel event notifications and the allow/block decision.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A read-only view of an event the panel is about to act on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Event {
    event_type: String,
    data: HashMap<String, String>,
    sync: bool,
}

impl Event {
    /// Creates a new event view.
    pub fn new(event_type: impl Into<String>, data: HashMap<String, String>, sync: bool) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            sync,
        }
    }

    /// The event type key, e.g. `server.suspend`.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// All event attributes.
    pub fn data(&self) -> &HashMap<String, String> {
        &self.data
    }

    /// Returns a single attribute.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    /// Whether the panel waits for the decision before proceeding.
    ///
    /// Asynchronous events are informational; their decision is ignored.
    pub fn is_sync(&self) -> bool {
        self.sync
    }
}

/// Decision returned from an event handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventResult {
    pub allow: bool,
    #[serde(default)]
    pub message: String,
}

impl EventResult {
    /// Lets the action proceed.
    pub fn allow() -> Self {
        Self {
            allow: true,
            message: String::new(),
        }
    }

    /// Blocks the action with a message shown to the initiator.
    pub fn block(message: impl Into<String>) -> Self {
        Self {
            allow: false,
            message: message.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.allow
    }
}

impl Default for EventResult {
    fn default() -> Self {
        Self::allow()
    }
}
