//! Transport error types.

use thiserror::Error;

/// Errors raised while serving the plugin protocol or calling the panel.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The HTTP request could not be sent or its body could not be read.
    #[cfg(feature = "client")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The panel answered with a non-success status.
    #[error("panel returned {status}: {body}")]
    Status { status: u16, body: String },

    /// A response body did not match the expected shape.
    #[error("failed to decode {what}: {source}")]
    Decode {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    /// The protocol server could not bind its listener.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    pub fn decode(what: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            what: what.into(),
            source,
        }
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Returns true when the panel rejected the call with a 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

pub type TransportResult<T> = Result<T, TransportError>;
