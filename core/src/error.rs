//! Error types for the Discovery client.
//!
//! # Design
//! Argument and configuration errors are raised before anything reaches the
//! transport. Everything the transport or the server reports is surfaced
//! unchanged: non-2xx statuses land in `Http` with the raw body alongside the
//! server's own error message when it sent one.

use thiserror::Error;

use crate::http::HttpResponse;

/// Errors returned by `DiscoveryClient`.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The client could not be constructed or configured.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required per-call parameter was not supplied.
    #[error("{0} must be provided")]
    MissingArgument(&'static str),

    /// A parameter was supplied but cannot be sent as-is.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Reading a document from disk failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// The transport failed to complete the HTTP exchange.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        body: String,
    },

    /// A successful response body was not valid JSON.
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),
}

impl DiscoveryError {
    /// Build an `Http` error from a non-2xx response.
    ///
    /// The message comes from the first of `error`, `message` or
    /// `errorMessage` in a JSON body, falling back to the reason phrase.
    pub fn from_response(response: &HttpResponse) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(&response.body)
            .ok()
            .and_then(|body| {
                ["error", "message", "errorMessage"]
                    .iter()
                    .find_map(|key| body.get(key).and_then(|v| v.as_str()).map(str::to_string))
            })
            .unwrap_or_else(|| reason_phrase(response.status).to_string());
        DiscoveryError::Http {
            status: response.status,
            message,
            body: response.body.clone(),
        }
    }

    /// The HTTP status, when the error came from the server.
    pub fn status(&self) -> Option<u16> {
        match self {
            DiscoveryError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn reason_phrase(status: u16) -> &'static str {
    ureq::http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("unknown status")
}
