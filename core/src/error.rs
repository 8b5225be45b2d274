//! Error types for the Colore client.
//!
//! # Design
//! A failed exchange with the service is classified into one of three
//! outcomes: the service could not be reached (`Unavailable`), the caller did
//! something the service rejected (`Client`, status 400..=499), or anything
//! else (`Server`). The remaining variants cover failures that happen on the
//! caller's side of the wire.
//!
//! `ApiError` always keeps the raw response body so callers can inspect what
//! the service actually said.

use serde::Deserialize;
use thiserror::Error;

use crate::http::HttpResponse;

/// Message used when an error body cannot be decoded.
pub const UNKNOWN_ERROR: &str = "Unknown error (see response_body)";

/// A convenience alias for `Result<T, ColoreError>`.
pub type Result<T> = std::result::Result<T, ColoreError>;

/// Errors returned by `ColoreClient` operations.
#[derive(Debug, Error)]
pub enum ColoreError {
    /// The service could not be reached at all.
    #[error("The Colore storage system is unavailable")]
    Unavailable,

    /// The service rejected the request (HTTP 400..=499).
    #[error("{}", .0.message)]
    Client(ApiError),

    /// The service failed, or replied with something that could not be decoded.
    #[error("{}", .0.message)]
    Server(ApiError),

    /// The request could not be issued for a reason other than connecting.
    #[error("request could not be sent: {0}")]
    Transport(String),

    /// Staging upload content failed locally.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A success response declared as JSON did not decode.
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The client configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ColoreError {
    /// The API error payload, for `Client` and `Server` errors.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            ColoreError::Client(api) | ColoreError::Server(api) => Some(api),
            _ => None,
        }
    }

    /// HTTP status reported by the service, if any.
    pub fn status(&self) -> Option<u16> {
        self.api_error().map(|api| api.status)
    }

    /// Raw response body attached to a `Client` or `Server` error.
    pub fn response_body(&self) -> Option<&str> {
        self.api_error().map(|api| api.response_body.as_str())
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, ColoreError::Client(_))
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self, ColoreError::Server(_))
    }
}

/// Details of an error reported by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// Status from the decoded error body, or 0 when it did not decode.
    pub status: u16,
    pub message: String,
    /// Service-side backtrace, only sent when the client asks for one.
    pub backtrace: Option<ServiceBacktrace>,
    pub response_body: String,
}

/// Backtrace returned by the service, either as one string or one entry per frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ServiceBacktrace {
    Text(String),
    Lines(Vec<String>),
}

/// Error body shape: `{"status": <int>, "description": <string>, "backtrace": ...}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    status: u16,
    description: Option<String>,
    #[serde(default)]
    backtrace: Option<ServiceBacktrace>,
}

/// Classify a non-success response.
///
/// The body must be a JSON object; 400..=499 becomes `Client`, everything
/// else `Server`. Any other body (not JSON, an array, a scalar) becomes a
/// `Server` error with status 0.
pub fn from_response(response: &HttpResponse) -> ColoreError {
    let response_body = response.body_text();
    let decoded = serde_json::from_slice::<serde_json::Value>(&response.body)
        .ok()
        .filter(serde_json::Value::is_object)
        .and_then(|value| serde_json::from_value::<ErrorBody>(value).ok());
    match decoded {
        Some(decoded) => from_error_body(decoded, response_body),
        None => ColoreError::Server(ApiError {
            status: 0,
            message: UNKNOWN_ERROR.to_string(),
            backtrace: None,
            response_body,
        }),
    }
}

fn from_error_body(decoded: ErrorBody, response_body: String) -> ColoreError {
    let api = ApiError {
        status: decoded.status,
        message: decoded
            .description
            .unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
        backtrace: decoded.backtrace,
        response_body,
    };
    match api.status {
        400..=499 => ColoreError::Client(api),
        _ => ColoreError::Server(api),
    }
}
