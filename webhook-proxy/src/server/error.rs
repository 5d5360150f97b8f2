//! HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use crate::credentials::{AuthError, CredentialError};
use crate::ingest::IngestError;

/// Errors returned by HTTP handlers.
///
/// The response body is a short fixed message; details go to the log only.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("malformed webhook: {0}")]
    MalformedIngest(#[from] IngestError),

    #[error("malformed token request")]
    MalformedTokenRequest,

    #[error("listener not authorized: {0}")]
    Unauthorized(#[from] AuthError),

    #[error("stream cannot be opened")]
    StreamUnavailable,

    #[error("metrics scrape not authorized")]
    MetricsUnauthorized,

    #[error(transparent)]
    Credential(#[from] CredentialError),
}

impl ApiError {
    /// Status code and body for this error.
    pub fn status_and_message(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::MalformedIngest(_) => (StatusCode::BAD_REQUEST, "bad request"),
            ApiError::MalformedTokenRequest => (
                StatusCode::BAD_REQUEST,
                "Bad request. Field `request_id` (string) is required.",
            ),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::StreamUnavailable => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to open stream, try again later",
            ),
            ApiError::MetricsUnauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            ApiError::Credential(CredentialError::AlreadyExists(_)) => {
                (StatusCode::CONFLICT, "token already exists")
            }
            ApiError::Credential(CredentialError::SecretGeneration(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "cannot generate token")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            warn!(error = %self, "Request rejected");
        }
        (status, message).into_response()
    }
}
