//! Error types for the session client.

use std::time::Duration;

use thiserror::Error;

/// A form field failed its syntactic check. The display string is the
/// message shown to the operator.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid Remote ID. Please enter a valid UUID.")]
    RemoteId,

    #[error("Invalid MFA Code. Please enter a 6-digit number.")]
    Otp,
}

/// Errors that can occur while negotiating or running a session.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Local input check failed; nothing was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The broker answered with a non-success status.
    #[error("{message}")]
    Rejected {
        /// Best available human-readable reason.
        message: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The broker did not answer within the configured bound.
    #[error("session request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Another session request from this client is still outstanding.
    #[error("a session request is already in progress")]
    RequestInFlight,

    /// A session is already live; disconnect first.
    #[error("already connected; disconnect first")]
    SessionLive,

    /// An HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// A WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    /// The response was invalid or malformed.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    pub fn rejected(message: impl Into<String>, status: u16) -> Self {
        Self::Rejected {
            message: message.into(),
            status,
        }
    }

    /// Get the HTTP status code, if the broker rejected the request.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if this is an authentication rejection (HTTP 401 or 403).
    pub fn is_auth_rejection(&self) -> bool {
        matches!(
            self,
            Self::Rejected {
                status: 401 | 403,
                ..
            }
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
