//! HTTP surface of the proxy.
//!
//! | Route                     | Handler                        |
//! |---------------------------|--------------------------------|
//! | `POST /webhook`           | [`handlers::receive_webhook`]  |
//! | `POST /token`             | [`handlers::issue_token`]      |
//! | `GET /listen/:request_id` | [`handlers::listen`]           |
//! | `GET /health`             | [`handlers::health`]           |
//! | `GET /metrics`            | [`handlers::metrics`]          |

mod auth;
mod error;
pub mod handlers;

pub use auth::{bearer_token, MetricsAuth};
pub use error::ApiError;
pub use handlers::TokenResponse;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderName;
use axum::routing::{get, post};
use axum::Router;
use tokio_util::task::TaskTracker;
use tower_http::trace::TraceLayer;

use crate::ingest::IngestHandler;
use crate::metrics::SharedMetricsState;
use crate::session::SessionContext;

/// Shared state for Axum handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub ingest: IngestHandler,
    pub sessions: SessionContext,
    /// Tracks running listener sessions so shutdown can wait for them.
    pub tracker: TaskTracker,
    pub signature_header: HeaderName,
    pub metrics_state: SharedMetricsState,
    pub metrics_auth: MetricsAuth,
}

/// Builds the router with all routes and request tracing.
///
/// Webhook bodies are not size capped; model outputs routinely exceed
/// axum's default request limit.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/webhook",
            post(handlers::receive_webhook).layer(DefaultBodyLimit::disable()),
        )
        .route("/token", post(handlers::issue_token))
        .route("/listen/:request_id", get(handlers::listen))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
