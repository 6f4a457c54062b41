//! HTTP response contract.
//!
//! Authentication and authorization failures render as `{"error": message}`
//! with the failure's status. Errors raised, or panics, inside a guarded
//! handler render as a 500 envelope with `success: false`; outside
//! development the message is replaced and no debug detail is attached.
//! Successful handlers return `{"success": true, ...data}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use querydeck_platform_access::AccessError;
use serde::Serialize;
use serde_json::json;
use std::any::Any;
use std::fmt;

/// Failures that stop the server from starting.
#[derive(Debug)]
pub enum StartupError {
    Config { details: String },
    Database { details: String },
    Migration { details: String },
    Bind { address: String, details: String },
    Serve { details: String },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "invalid configuration: {}", details),
            Self::Database { details } => write!(f, "database unavailable: {}", details),
            Self::Migration { details } => write!(f, "migrations failed: {}", details),
            Self::Bind { address, details } => {
                write!(f, "failed to bind '{}': {}", address, details)
            }
            Self::Serve { details } => write!(f, "server error: {}", details),
        }
    }
}

impl std::error::Error for StartupError {}

/// Message shown in place of internal errors outside development.
pub const REDACTED: &str = "Internal server error";

/// An access failure rendered as a response.
#[derive(Debug)]
pub struct ApiError(pub AccessError);

impl From<AccessError> for ApiError {
    fn from(error: AccessError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({ "error": self.0.message() }))).into_response()
    }
}

/// Failure raised by a handler running behind a guard.
///
/// Any error type converts into it, so handlers use `?` freely.
#[derive(Debug)]
pub struct HandlerError {
    message: String,
    detail: String,
}

impl HandlerError {
    pub fn msg(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            detail: message.clone(),
            message,
        }
    }

    /// Builds the error for a handler that panicked, keeping the panic
    /// message when it is a string.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "handler panicked".to_string());
        Self {
            detail: format!("panic: {message}"),
            message,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Renders the 500 envelope, with the real message and debug detail only
    /// when `expose` is set.
    pub fn into_response(self, expose: bool) -> Response {
        tracing::error!(error = %self.message, detail = %self.detail, "handler failed");

        let body = if expose {
            json!({
                "success": false,
                "error": self.message,
                "timestamp": Utc::now().to_rfc3339(),
                "stack": self.detail,
            })
        } else {
            json!({
                "success": false,
                "error": REDACTED,
                "timestamp": Utc::now().to_rfc3339(),
            })
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

impl<E: std::error::Error> From<E> for HandlerError {
    fn from(error: E) -> Self {
        Self {
            message: error.to_string(),
            detail: format!("{error:?}"),
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

pub type HandlerResult<T> = Result<T, HandlerError>;

/// Successful response: `data` flattened beside `success: true`.
#[derive(Debug, Serialize)]
pub struct ApiSuccess<T> {
    success: bool,
    #[serde(flatten)]
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl<T: Serialize> ApiSuccess<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T: Serialize> IntoResponse for ApiSuccess<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
