//! Typed settings for each section of `config.ini`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Parsed contents of `config.ini`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub server: ServerSettings,
    pub stream: StreamSettings,
    pub tokens: TokenSettings,
    pub webhook: WebhookSettings,
    pub metrics: MetricsSettings,
    pub logging: LoggingSettings,
}

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Listen address (host:port)
    pub addr: SocketAddr,
    /// Time sessions get to send their final frame on shutdown
    pub shutdown_grace: Duration,
}

/// `[stream]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSettings {
    /// How long a listener waits for its webhook. Zero closes immediately.
    pub timeout: Duration,
    /// Interval between keep-alive frames
    pub keepalive_interval: Duration,
}

/// `[tokens]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSettings {
    pub ttl: Duration,
}

/// `[webhook]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookSettings {
    pub signature_header: String,
}

/// `[metrics]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSettings {
    /// Bearer token for `GET /metrics`; falls back to `PROXY_METRICS_TOKEN`
    pub token: Option<String>,
    pub allow_insecure: bool,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub file: PathBuf,
}
