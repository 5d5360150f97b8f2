//! Route handlers.

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::auth::bearer_token;
use super::error::ApiError;
use super::AppState;
use crate::metrics::{report_shared, PrometheusReporter};
use crate::session::{ChannelSink, StreamSession, DEFAULT_SINK_CAPACITY};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Body of `POST /token`.
#[derive(Debug, Deserialize)]
struct TokenRequest {
    #[serde(default)]
    request_id: Option<String>,
}

/// Response of `POST /token`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub token: String,
    /// Unix seconds, as a string.
    pub expires_at: String,
}

/// `POST /webhook`
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let signature = header_str(&headers, &state.signature_header);
    state.ingest.ingest(signature, body)?;
    Ok(StatusCode::OK)
}

/// `POST /token`
pub async fn issue_token(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TokenResponse>, ApiError> {
    let request: TokenRequest =
        serde_json::from_slice(&body).map_err(|_| ApiError::MalformedTokenRequest)?;
    let request_id = request
        .request_id
        .filter(|id| !id.is_empty())
        .ok_or(ApiError::MalformedTokenRequest)?;

    let credential = state.sessions.credentials.issue(&request_id)?;
    state.sessions.metrics.token_issued();
    info!(request_id = %request_id, "Stream token issued");

    Ok(Json(TokenResponse {
        token: credential.secret().to_string(),
        expires_at: credential.expires_at_unix().to_string(),
    }))
}

/// `GET /listen/:request_id`
///
/// Authorizes the listener, then hands the connection to a tracked
/// [`StreamSession`] that feeds the response body.
pub async fn listen(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    debug!(request_id = %request_id, "New listener");
    state
        .sessions
        .credentials
        .verify(&request_id, bearer_token(&headers))?;

    if state.sessions.shutdown.is_cancelled() || state.tracker.is_closed() {
        return Err(ApiError::StreamUnavailable);
    }

    let (sink, stream) = ChannelSink::new(DEFAULT_SINK_CAPACITY);
    let mut session = StreamSession::new(state.sessions.clone(), request_id, sink);
    state.tracker.spawn(async move {
        session.run().await;
    });

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `GET /metrics`
pub async fn metrics(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if !state.metrics_auth.permits(&headers) {
        return Err(ApiError::MetricsUnauthorized);
    }

    let body = report_shared(&state.metrics_state, &PrometheusReporter::new());
    Ok(([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body).into_response())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
