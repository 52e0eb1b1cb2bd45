//! Server-wide error taxonomy and HTTP status mapping.
//!
//! Every request-path failure collapses into one of five categories. The
//! mapping is deliberately lossy: an ACL-blocked file, an expired share
//! token, and a genuinely missing path all answer 404 so that a caller
//! cannot distinguish "hidden" from "absent".

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Missing, blocked or expired resource.
    #[error("not found")]
    NotFound,

    /// Missing or incorrect credential on a gated resource.
    #[error("not authorized")]
    Unauthorized,

    /// Operation disallowed by server mode.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Malformed request parameter.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// I/O or encoding failure.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for request handling.
pub type ServerResult<T> = std::result::Result<T, ServerError>;

impl ServerError {
    /// The HTTP status this error renders as.
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServerError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ServerError::NotFound,
            _ => ServerError::Internal(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        ServerError::Internal(err.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ServerError::Internal(msg) => {
                tracing::error!(error = %msg, "request failed");
            }
            other => {
                tracing::debug!(status = %status, error = %other, "request rejected");
            }
        }
        let mut response = (status, self.to_string()).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static(r#"Basic realm="Restricted""#),
            );
        }
        response
    }
}
