use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// The main error type for pricebatch
#[derive(Debug, thiserror::Error)]
pub enum PricebatchError {
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error("Session expired: {0}")]
    SessionExpired(String),

    #[error("Session closed: {0}")]
    SessionClosed(String),

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Standard error response body for API errors.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl PricebatchError {
    pub fn unknown_session(id: impl Into<String>) -> Self {
        Self::UnknownSession(id.into())
    }

    pub fn session_expired(id: impl Into<String>) -> Self {
        Self::SessionExpired(id.into())
    }

    pub fn session_closed(id: impl Into<String>) -> Self {
        Self::SessionClosed(id.into())
    }

    pub fn invalid_credential(msg: impl Into<String>) -> Self {
        Self::InvalidCredential(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::UnknownSession(_) => StatusCode::NOT_FOUND,
            Self::SessionExpired(_) => StatusCode::GONE,
            Self::SessionClosed(_) => StatusCode::CONFLICT,
            Self::InvalidCredential(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) | Self::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a safe error message suitable for client responses.
    ///
    /// Client errors (4xx) expose their message; server errors (5xx) show a
    /// generic message to prevent information disclosure. Full details are
    /// logged server-side.
    fn safe_message(&self) -> String {
        match self {
            Self::Internal(_) | Self::Anyhow(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for PricebatchError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let body = Json(ErrorResponse {
            error: self.safe_message(),
        });

        (status, body).into_response()
    }
}

/// Result type alias for pricebatch operations
pub type Result<T> = std::result::Result<T, PricebatchError>;
