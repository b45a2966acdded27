use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-field validation message returned by the API alongside a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub field: String,
    pub message: String,
}

/// Errors produced by the client.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid credentials, detected before any request is made.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("Missing content range")]
    MissingRange,

    /// A `Content-Range` header that does not follow `{unit} {first}-{last}/{count}`.
    #[error("{0}")]
    Format(String),

    /// Non-2xx response, unparsable payload, or a cursor that cannot be followed.
    #[error("{message}")]
    Request {
        status: Option<u16>,
        message: String,
        errors: Vec<ErrorMessage>,
    },

    #[error("Failed to make request: {0}")]
    Connection(#[from] reqwest::Error),

    #[error("failed to encode request: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Download(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// A request error that did not come from an HTTP status.
    pub(crate) fn request(message: impl Into<String>) -> Self {
        Self::Request {
            status: None,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    /// HTTP status carried by a [`Error::Request`], if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request { status, .. } => *status,
            Self::Connection(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ServerErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorMessage>,
}

/// Builds the error for a failed response, preferring the server's own message.
pub(crate) fn server_error(status: u16, body: &str) -> Error {
    let payload = serde_json::from_str::<ServerErrorResponse>(body).unwrap_or_default();

    let message = payload
        .message
        .filter(|m| !m.trim().is_empty())
        .or_else(|| {
            StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "Unknown response".to_string());

    Error::Request {
        status: Some(status),
        message,
        errors: payload.errors,
    }
}
