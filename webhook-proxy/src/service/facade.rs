//! Proxy service facade implementation.

use super::config::ServiceConfig;
use super::error::ServiceError;
use crate::credentials::CredentialStore;
use crate::ingest::IngestHandler;
use crate::metrics::{MetricsClient, MetricsSystem, PrometheusReporter};
use crate::server::{self, AppState, MetricsAuth};
use crate::session::SessionContext;
use crate::store::RendezvousStore;
use crate::sweeper::Sweeper;
use axum::http::HeaderName;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// High-level facade for the webhook proxy.
///
/// Wires the store, credentials, metrics, sweeper and HTTP server together
/// and owns their lifecycle.
///
/// # Shutdown
///
/// Cancelling [`shutdown_token`](Self::shutdown_token) starts a graceful
/// shutdown:
///
/// 1. Sessions are told to stop and send their final frame
/// 2. Up to the grace period is spent waiting for them
/// 3. The HTTP listener stops accepting and drains connections
/// 4. The metrics daemon is stopped
///
/// # Example
///
/// ```ignore
/// use webhook_proxy::service::{ProxyService, ServiceConfig};
///
/// let service = ProxyService::new(ServiceConfig::default())?;
/// let shutdown = service.shutdown_token();
/// tokio::spawn(async move { service.run().await });
/// // ...
/// shutdown.cancel();
/// ```
pub struct ProxyService {
    config: ServiceConfig,
    store: Arc<RendezvousStore>,
    credentials: Arc<CredentialStore>,
    metrics: MetricsSystem,
    state: AppState,
    /// External trigger for graceful shutdown.
    shutdown: CancellationToken,
    /// Broadcast to sessions and the sweeper once shutdown begins.
    session_shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl ProxyService {
    /// Create the service from configuration.
    ///
    /// Must be called from within a Tokio runtime; the metrics daemon is
    /// spawned immediately.
    ///
    /// # Errors
    ///
    /// Fails if there is no runtime, the signature header is not a valid
    /// header name, or a metrics token cannot be generated.
    pub fn new(config: ServiceConfig) -> Result<Self, ServiceError> {
        let metrics_auth = config.resolve_metrics_auth()?;
        Self::with_metrics_auth(config, metrics_auth)
    }

    /// Create the service with an explicit metrics policy, bypassing the
    /// environment lookup.
    pub fn with_metrics_auth(
        config: ServiceConfig,
        metrics_auth: MetricsAuth,
    ) -> Result<Self, ServiceError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ServiceError::RuntimeError(e.to_string()))?;

        let signature_header = HeaderName::from_bytes(config.signature_header().as_bytes())
            .map_err(|e| {
                ServiceError::ConfigError(format!(
                    "invalid signature header '{}': {}",
                    config.signature_header(),
                    e
                ))
            })?;

        let store = Arc::new(RendezvousStore::new());
        let credentials = Arc::new(CredentialStore::new(config.token_ttl()));
        let metrics = MetricsSystem::new(&runtime);
        let session_shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();

        let sessions = SessionContext {
            store: Arc::clone(&store),
            credentials: Arc::clone(&credentials),
            metrics: metrics.client(),
            config: config.session(),
            shutdown: session_shutdown.clone(),
        };

        let state = AppState {
            ingest: IngestHandler::new(Arc::clone(&store), metrics.client()),
            sessions,
            tracker: tracker.clone(),
            signature_header,
            metrics_state: metrics.state_handle(),
            metrics_auth,
        };

        Ok(Self {
            config,
            store,
            credentials,
            metrics,
            state,
            shutdown: CancellationToken::new(),
            session_shutdown,
            tracker,
        })
    }

    /// Get the service configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Returns the router serving all proxy routes.
    pub fn router(&self) -> Router {
        server::router(self.state.clone())
    }

    /// Token that starts a graceful shutdown when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn store(&self) -> Arc<RendezvousStore> {
        Arc::clone(&self.store)
    }

    pub fn credentials(&self) -> Arc<CredentialStore> {
        Arc::clone(&self.credentials)
    }

    pub fn metrics_client(&self) -> MetricsClient {
        self.metrics.client()
    }

    /// Current metrics in Prometheus text format.
    pub fn metrics_text(&self) -> String {
        self.metrics.snapshot(&PrometheusReporter::new())
    }

    pub fn metrics_auth(&self) -> &MetricsAuth {
        &self.state.metrics_auth
    }

    /// Number of listener sessions still running.
    pub fn active_sessions(&self) -> usize {
        self.tracker.len()
    }

    /// Binds the configured address and serves until shutdown.
    pub async fn run(self) -> Result<(), ServiceError> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServiceError::Bind { addr, source })?;
        self.serve(listener).await
    }

    /// Serves on `listener` until the shutdown token is cancelled.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServiceError> {
        let local_addr = listener.local_addr()?;
        let grace = self.config.shutdown_grace();

        let sweeper = Sweeper::new(
            Arc::clone(&self.store),
            Arc::clone(&self.credentials),
            self.metrics.client(),
            self.config.session().timeout,
        );
        let sweeper_handle = tokio::spawn(sweeper.run(self.session_shutdown.clone()));

        let server_stop = CancellationToken::new();
        let stop = server_stop.clone();
        let app = self.router();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { stop.cancelled().await })
                .await
        });
        info!(addr = %local_addr, "Listening");

        let early_exit = tokio::select! {
            _ = self.shutdown.cancelled() => None,
            result = &mut server => Some(result),
        };

        if let Some(result) = early_exit {
            warn!("HTTP server stopped before shutdown was requested");
            self.session_shutdown.cancel();
            self.tracker.close();
            let _ = sweeper_handle.await;
            self.metrics.shutdown().await;
            return result?.map_err(ServiceError::from);
        }

        info!(
            sessions = self.tracker.len(),
            grace_secs = grace.as_secs(),
            "Shutting down, notifying listeners"
        );
        self.session_shutdown.cancel();
        self.tracker.close();
        if tokio::time::timeout(grace, self.tracker.wait()).await.is_err() {
            warn!(
                sessions = self.tracker.len(),
                "Grace period elapsed with sessions still running"
            );
        }

        server_stop.cancel();
        let result = match tokio::time::timeout(grace, &mut server).await {
            Ok(joined) => joined?.map_err(ServiceError::from),
            Err(_) => {
                warn!("HTTP server did not drain in time, aborting");
                server.abort();
                Ok(())
            }
        };

        let _ = sweeper_handle.await;
        self.metrics.shutdown().await;
        info!("Stopped accepting new connections");
        result
    }
}

impl std::fmt::Debug for ProxyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyService")
            .field("addr", &self.config.addr())
            .field("sessions", &self.tracker.len())
            .field("metrics", &self.metrics)
            .finish()
    }
}
