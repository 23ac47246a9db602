/// Unified error types for the license panel
use crate::services::ServiceFlag;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where users are sent when they lack a service flag
pub const DASHBOARD_PATH: &str = "/dashboard/";

/// Main error type for the panel
#[derive(Error, Debug)]
pub enum PanelError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Authorization errors
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// The user is signed in but the service flag is off
    #[error("You do not have access to this service: {}", .0.display_name())]
    ServiceRequired(ServiceFlag),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict errors (e.g., duplicate username)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Password hashing errors
    #[error("Password hashing error: {0}")]
    PasswordHash(String),
}

/// JSON error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

impl PanelError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            PanelError::Authentication(_) => StatusCode::UNAUTHORIZED,
            PanelError::Authorization(_) => StatusCode::FORBIDDEN,
            PanelError::ServiceRequired(_) => StatusCode::SEE_OTHER,
            PanelError::Validation(_) => StatusCode::BAD_REQUEST,
            PanelError::NotFound(_) => StatusCode::NOT_FOUND,
            PanelError::Conflict(_) => StatusCode::CONFLICT,
            PanelError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            PanelError::Database(_)
            | PanelError::Internal(_)
            | PanelError::Io(_)
            | PanelError::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable code
    pub fn error_code(&self) -> &'static str {
        match self {
            PanelError::Authentication(_) => "AuthenticationRequired",
            PanelError::Authorization(_) => "Forbidden",
            PanelError::ServiceRequired(_) => "ServiceRequired",
            PanelError::Validation(_) => "InvalidRequest",
            PanelError::NotFound(_) => "NotFound",
            PanelError::Conflict(_) => "Conflict",
            PanelError::RateLimitExceeded { .. } => "RateLimitExceeded",
            _ => "InternalServerError",
        }
    }

    /// Message safe to show to clients
    pub fn public_message(&self) -> String {
        match self {
            PanelError::Database(_)
            | PanelError::Internal(_)
            | PanelError::Io(_)
            | PanelError::PasswordHash(_) => "Internal server error".to_string(), // Don't leak details
            PanelError::NotFound(msg)
            | PanelError::Conflict(msg)
            | PanelError::Validation(msg)
            | PanelError::Authorization(msg)
            | PanelError::Authentication(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

/// Convert PanelError to HTTP response
impl IntoResponse for PanelError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        if let PanelError::ServiceRequired(flag) = &self {
            tracing::warn!(service = flag.as_str(), "service access denied");
            let body = Json(ErrorResponse {
                error: self.error_code().to_string(),
                message: self.to_string(),
                redirect: Some(DASHBOARD_PATH.to_string()),
            });
            return (status, [(header::LOCATION, DASHBOARD_PATH)], body).into_response();
        }

        let mut response = (
            status,
            Json(ErrorResponse {
                error: self.error_code().to_string(),
                message: self.public_message(),
                redirect: None,
            }),
        )
            .into_response();

        if let PanelError::RateLimitExceeded { retry_after } = self {
            if let Ok(value) = retry_after.as_secs().max(1).to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

/// Result type alias for panel operations
pub type PanelResult<T> = Result<T, PanelError>;
