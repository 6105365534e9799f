//! Error types for the dispatch core.
//!
//! Absent handlers are never errors: every call kind has a defined default
//! (allow, no-op, transparent `NEXT`, 404). The variants below cover the
//! cases that terminate a single call without a structured answer.

use std::fmt;

use thiserror::Error;

/// The kind of handler a call was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    Event,
    Route,
    Schedule,
    Mixin,
    Startup,
}

impl HandlerKind {
    /// Returns the lowercase name used in logs and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Route => "route",
            Self::Schedule => "schedule",
            Self::Mixin => "mixin",
            Self::Startup => "startup",
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that terminate a single dispatched call.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The serialized mixin input or chain data could not be decoded.
    #[error("malformed {field} for mixin target '{target}': {source}")]
    MalformedPayload {
        /// Mixin target the payload was addressed to.
        target: String,
        /// Which payload field failed (`input` or `chain_data`).
        field: &'static str,
        /// Underlying decode failure.
        source: serde_json::Error,
    },

    /// A handler returned an error or panicked.
    #[error("{kind} handler '{selector}' failed: {message}")]
    HandlerFault {
        kind: HandlerKind,
        selector: String,
        message: String,
    },

    /// A handler produced a value that could not be serialized.
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

impl DispatchError {
    /// Creates a malformed payload error.
    pub fn malformed(
        target: impl Into<String>,
        field: &'static str,
        source: serde_json::Error,
    ) -> Self {
        Self::MalformedPayload {
            target: target.into(),
            field,
            source,
        }
    }

    /// Creates a handler fault error.
    pub fn fault(kind: HandlerKind, selector: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HandlerFault {
            kind,
            selector: selector.into(),
            message: message.into(),
        }
    }

    /// Returns true when the caller sent an undecodable payload.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedPayload { .. })
    }
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;
