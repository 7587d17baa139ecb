//! # error
//!
//! Error types for the whole service.
//!
//! * [`ValidationError`] — why a raw payload was refused by the Tick Validator.
//! * [`FeedError`] — the feed taxonomy (validation / connection / timeout).
//!   None of these is fatal: each one is turned into a fallback path by the
//!   component that observes it.
//! * [`AppError`] — what HTTP handlers return.  Axum's `IntoResponse` impl
//!   converts these into structured JSON error bodies.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// ─── Validation ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("payload is not valid JSON: {0}")]
    Malformed(String),

    #[error("symbol missing or empty")]
    MissingSymbol,

    #[error("price missing, non-numeric or not finite")]
    InvalidPrice,

    #[error("price is negative")]
    NegativePrice,

    #[error("volume missing or not a non-negative integer")]
    InvalidVolume,

    #[error("timestamp is not RFC 3339: {0}")]
    InvalidTimestamp(String),
}

// ─── Feed ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("timed out after {0} ms")]
    Timeout(u64),
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        FeedError::Connection(err.to_string())
    }
}

// ─── HTTP ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AppError {
    /// The request payload was syntactically correct but semantically invalid.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The feed controller task is gone (only during shutdown).
    #[error("Feed controller unavailable")]
    ControllerUnavailable,

    /// `/api/seed` while the tick store is disabled.
    #[error("Tick store is disabled")]
    StoreUnavailable,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::ControllerUnavailable | AppError::StoreUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
        };

        let body = Json(json!({
            "ok":    false,
            "error": message,
        }));

        (status, body).into_response()
    }
}
