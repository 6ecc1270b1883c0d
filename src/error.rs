//! Error types for Supply Watch

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Tracker-engine errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    /// A tracker with the same id already exists for this owner
    #[error("Tracker already exists: {tracker_id}")]
    DuplicateTracker { tracker_id: String },

    /// Owner has reached the tracker quota for their role
    #[error("Tracker quota exceeded (limit {limit})")]
    QuotaExceeded { limit: usize },

    /// Significant change threshold must be strictly positive
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),

    /// Token decimals exceed what the decimal type can scale
    #[error("Invalid decimals: {0}")]
    InvalidDecimals(u32),

    /// Percentage could not be computed from the supply (zero supply, overflow)
    #[error("Invalid supply state: {0}")]
    InvalidSupplyState(String),

    /// An external call kept failing after the retry budget was spent
    #[error("Retry exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted { attempts: u32, last_error: String },

    /// Snapshot read/write failure
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl TrackerError {
    /// User-input errors are surfaced to the caller and never retried
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            TrackerError::DuplicateTracker { .. }
                | TrackerError::QuotaExceeded { .. }
                | TrackerError::InvalidThreshold(_)
                | TrackerError::InvalidDecimals(_)
        )
    }
}

/// Balance lookup failure for a single wallet
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Rate limited by balance source")]
    RateLimited,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Notification delivery failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeliveryError {
    #[error("Delivery rejected: {0}")]
    Rejected(String),

    #[error("Delivery transport error: {0}")]
    Transport(String),

    #[error("Delivery timed out")]
    TimedOut,
}

/// HTTP-facing application errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Tracker engine error
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    /// Request validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Error response structure for API
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status_code, reason) = match &self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_failed"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Tracker(e) => match e {
                TrackerError::DuplicateTracker { .. } => {
                    (StatusCode::CONFLICT, "duplicate_tracker")
                }
                TrackerError::QuotaExceeded { .. } => (StatusCode::FORBIDDEN, "quota_exceeded"),
                TrackerError::InvalidThreshold(_) | TrackerError::InvalidDecimals(_) => {
                    (StatusCode::BAD_REQUEST, "validation_failed")
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            },
        };

        let status = if status_code.is_server_error() {
            "error"
        } else {
            "rejected"
        };

        tracing::warn!(
            error_type = %self,
            status_code = %status_code,
            "Request error"
        );

        let body = ErrorResponse {
            status,
            reason: reason.to_string(),
            details: Some(self.to_string()),
        };

        (status_code, Json(json!(body))).into_response()
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for the tracker engine
pub type TrackerResult<T> = Result<T, TrackerError>;
