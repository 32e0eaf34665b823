//! Error types for the HTTP service

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use glowboost_core::{StoreError, SyncError};
use tracing::{error, warn};

/// Webhook handler errors with HTTP status code mapping
///
/// Cal.com treats any non-2xx response as a failed delivery and retries it,
/// so the status code is the only signal the provider acts on:
///
/// - `400 Bad Request`: body is not JSON or the booking payload is incomplete
/// - `401 Unauthorized`: signature missing or wrong
/// - `404 Not Found`: no salon owns the organizer's calendar
/// - `413 Payload Too Large`: body exceeds `server.max_body_size`
/// - `500 Internal Server Error`: store failure; details stay in the logs
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    /// Pipeline rejected the delivery
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Body could not be read
    #[error("Failed to read request body: {message}")]
    InvalidBody { message: String },

    /// Payload too large
    #[error("Payload too large (max: {max_size} bytes)")]
    PayloadTooLarge { max_size: usize },
}

impl WebhookHandlerError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Sync(e) => match e {
                SyncError::MalformedJson { .. } => StatusCode::BAD_REQUEST,
                SyncError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
                SyncError::InvalidSignature { .. } => StatusCode::UNAUTHORIZED,
                SyncError::SalonNotFound { .. } => StatusCode::NOT_FOUND,
                SyncError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::InvalidBody { .. } => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    /// Client-facing message; never includes store internals
    fn public_message(&self) -> String {
        match self {
            Self::Sync(SyncError::MalformedJson { .. }) => "Invalid JSON".to_string(),
            Self::Sync(SyncError::InvalidPayload(e)) => format!("Invalid booking payload: {e}"),
            Self::Sync(SyncError::InvalidSignature { .. }) => "Invalid signature".to_string(),
            Self::Sync(SyncError::SalonNotFound { .. }) => "Salon not found".to_string(),
            Self::Sync(SyncError::Store(_)) => "Failed to save booking".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "Webhook processing failed");
        } else {
            warn!(error = %self, status = status.as_u16(), "Webhook rejected");
        }

        error_response(status, self.public_message())
    }
}

/// Errors from the read API
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing or invalid API token")]
    Unauthorized,

    #[error("Invalid salon ID: {message}")]
    InvalidSalonId { message: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => {
                warn!("Rejected dashboard request without a valid API token");
                let mut response =
                    error_response(StatusCode::UNAUTHORIZED, "Unauthorized".to_string());
                response.headers_mut().insert(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static("Bearer"),
                );
                response
            }
            Self::InvalidSalonId { .. } => {
                warn!(error = %self, "Rejected read request");
                error_response(StatusCode::BAD_REQUEST, self.to_string())
            }
            Self::Store(ref e) => {
                error!(error = %e, "Read request failed");
                let status = if e.is_transient() {
                    StatusCode::SERVICE_UNAVAILABLE
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                error_response(
                    status,
                    "Internal server error occurred. Please try again later.".to_string(),
                )
            }
        }
    }
}

/// Build the JSON error body shared by all failure responses
pub fn error_response(status: StatusCode, message: String) -> Response {
    let body = serde_json::json!({
        "error": message,
        "status": status.as_u16(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status, Json(body)).into_response()
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

impl ServiceError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BindFailed { .. } => 1,
            Self::ServerFailed { .. } => 2,
            Self::Configuration(_) => 3,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration loading failed: {0}")]
    Load(#[from] config::ConfigError),
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
