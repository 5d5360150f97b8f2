//! Service configuration types.

use crate::credentials::{generate_secret, DEFAULT_CREDENTIAL_TTL, SECRET_BYTES};
use crate::ingest::DEFAULT_SIGNATURE_HEADER;
use crate::server::MetricsAuth;
use crate::session::{SessionConfig, DEFAULT_KEEPALIVE_INTERVAL, DEFAULT_STREAM_TIMEOUT};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tracing::warn;

use super::error::ServiceError;

/// Default listen address.
pub const DEFAULT_ADDR: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(Ipv4Addr::UNSPECIFIED),
    8000,
);

/// Default time sessions get to flush their last frame on shutdown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Environment variable consulted for the metrics token.
pub const METRICS_TOKEN_ENV: &str = "PROXY_METRICS_TOKEN";

/// Configuration for the proxy service.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use webhook_proxy::service::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .timeout(Duration::from_secs(30))
///     .allow_insecure_metrics(true)
///     .build();
///
/// assert_eq!(config.session().timeout, Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address the HTTP server binds to
    addr: SocketAddr,
    /// Listener session timing
    session: SessionConfig,
    /// Lifetime of issued stream tokens
    token_ttl: Duration,
    /// Grace period for sessions on shutdown
    shutdown_grace: Duration,
    /// Header carrying the webhook signature
    signature_header: String,
    /// Bearer token required by `GET /metrics`
    metrics_token: Option<String>,
    /// Serve metrics without a token when none is configured
    allow_insecure_metrics: bool,
}

impl ServiceConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn session(&self) -> SessionConfig {
        self.session
    }

    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    pub fn shutdown_grace(&self) -> Duration {
        self.shutdown_grace
    }

    pub fn signature_header(&self) -> &str {
        &self.signature_header
    }

    pub fn metrics_token(&self) -> Option<&str> {
        self.metrics_token.as_deref()
    }

    pub fn allow_insecure_metrics(&self) -> bool {
        self.allow_insecure_metrics
    }

    /// Decides how `GET /metrics` is protected.
    ///
    /// A configured token wins, then `PROXY_METRICS_TOKEN`. With neither,
    /// metrics are open only if insecure metrics are allowed; otherwise a
    /// random token is generated and logged.
    pub fn resolve_metrics_auth(&self) -> Result<MetricsAuth, ServiceError> {
        let env_token = std::env::var(METRICS_TOKEN_ENV).ok();
        resolve_metrics_auth(
            self.metrics_token.clone(),
            env_token,
            self.allow_insecure_metrics,
        )
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

fn resolve_metrics_auth(
    configured: Option<String>,
    env_token: Option<String>,
    allow_insecure: bool,
) -> Result<MetricsAuth, ServiceError> {
    if let Some(token) = configured
        .filter(|t| !t.is_empty())
        .or_else(|| env_token.filter(|t| !t.is_empty()))
    {
        return Ok(MetricsAuth::Bearer(token));
    }

    if allow_insecure {
        warn!("Metrics token not provided and insecure metrics allowed, /metrics is unauthenticated");
        return Ok(MetricsAuth::Open);
    }

    let token = generate_secret(SECRET_BYTES).map_err(ServiceError::SecretGeneration)?;
    warn!(
        metrics_token = %token,
        "Metrics token not provided and insecure metrics not allowed, generated a random token"
    );
    Ok(MetricsAuth::Bearer(token))
}

/// Builder for ServiceConfig.
///
/// Provides a fluent API for constructing service configuration.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfigBuilder {
    addr: Option<SocketAddr>,
    timeout: Option<Duration>,
    keepalive_interval: Option<Duration>,
    token_ttl: Option<Duration>,
    shutdown_grace: Option<Duration>,
    signature_header: Option<String>,
    metrics_token: Option<String>,
    allow_insecure_metrics: Option<bool>,
}

impl ServiceConfigBuilder {
    /// Set the listen address.
    pub fn addr(mut self, addr: SocketAddr) -> Self {
        self.addr = Some(addr);
        self
    }

    /// Set how long a listener may wait for its webhook.
    ///
    /// Also the retention window for uncollected webhooks.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the interval between keep-alive frames.
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = Some(interval);
        self
    }

    /// Set the lifetime of issued stream tokens.
    pub fn token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = Some(ttl);
        self
    }

    /// Set the shutdown grace period.
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = Some(grace);
        self
    }

    /// Set the header carrying webhook signatures.
    pub fn signature_header(mut self, name: impl Into<String>) -> Self {
        self.signature_header = Some(name.into());
        self
    }

    /// Set the bearer token required by `GET /metrics`.
    pub fn metrics_token(mut self, token: impl Into<String>) -> Self {
        self.metrics_token = Some(token.into());
        self
    }

    /// Allow unauthenticated metrics when no token is configured.
    pub fn allow_insecure_metrics(mut self, allow: bool) -> Self {
        self.allow_insecure_metrics = Some(allow);
        self
    }

    /// Build the configuration with defaults for unset values.
    pub fn build(self) -> ServiceConfig {
        ServiceConfig {
            addr: self.addr.unwrap_or(DEFAULT_ADDR),
            session: SessionConfig {
                timeout: self.timeout.unwrap_or(DEFAULT_STREAM_TIMEOUT),
                keepalive_interval: self
                    .keepalive_interval
                    .unwrap_or(DEFAULT_KEEPALIVE_INTERVAL),
            },
            token_ttl: self.token_ttl.unwrap_or(DEFAULT_CREDENTIAL_TTL),
            shutdown_grace: self.shutdown_grace.unwrap_or(DEFAULT_SHUTDOWN_GRACE),
            signature_header: self
                .signature_header
                .unwrap_or_else(|| DEFAULT_SIGNATURE_HEADER.to_string()),
            metrics_token: self.metrics_token,
            allow_insecure_metrics: self.allow_insecure_metrics.unwrap_or(false),
        }
    }
}
