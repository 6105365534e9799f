//! Terminal decisions of a mixin hop.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value::Payload;

/// Key under which non-object return values are wrapped.
pub const RESULT_KEY: &str = "result";

/// What the panel should do after this hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MixinAction {
    /// Continue with the next hop, optionally with a modified input.
    Next,
    /// Stop the pipeline and use the output as the final answer.
    Return,
    /// Abort the pipeline and surface the error to the initiator.
    Error,
}

/// Advisory message for the panel to surface to an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Notification {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind: kind.into(),
        }
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(title, message, "info")
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(title, message, "success")
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(title, message, "warning")
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(title, message, "error")
    }
}

/// The decision a mixin handler hands back.
///
/// Results are built through the terminal methods of
/// [`MixinContext`](super::MixinContext): `next`, `return_value` and `error`.
#[derive(Debug, Clone, PartialEq)]
pub struct MixinResult {
    action: MixinAction,
    modified_input: Option<Payload>,
    output: Option<Payload>,
    error: Option<String>,
    notifications: Vec<Notification>,
}

impl MixinResult {
    pub(crate) fn next(modified_input: Option<Payload>) -> Self {
        Self {
            action: MixinAction::Next,
            modified_input,
            output: None,
            error: None,
            notifications: Vec::new(),
        }
    }

    pub(crate) fn returning(data: Value) -> Self {
        let output = match data {
            Value::Object(map) => map,
            other => {
                let mut map = Payload::new();
                map.insert(RESULT_KEY.to_string(), other);
                map
            }
        };
        Self {
            action: MixinAction::Return,
            modified_input: None,
            output: Some(output),
            error: None,
            notifications: Vec::new(),
        }
    }

    pub(crate) fn failed(message: String) -> Self {
        Self {
            action: MixinAction::Error,
            modified_input: None,
            output: None,
            error: Some(message),
            notifications: Vec::new(),
        }
    }

    pub(crate) fn with_notifications(mut self, mut notifications: Vec<Notification>) -> Self {
        notifications.append(&mut self.notifications);
        self.notifications = notifications;
        self
    }

    /// Attaches a notification to this result.
    pub fn with_notification(mut self, notification: Notification) -> Self {
        self.notifications.push(notification);
        self
    }

    pub fn action(&self) -> MixinAction {
        self.action
    }

    /// The copy-on-write input, present only for `NEXT` after a `set`.
    pub fn modified_input(&self) -> Option<&Payload> {
        self.modified_input.as_ref()
    }

    pub fn output(&self) -> Option<&Payload> {
        self.output.as_ref()
    }

    /// The error message, empty when none was given.
    pub fn error(&self) -> &str {
        self.error.as_deref().unwrap_or_default()
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }
}
