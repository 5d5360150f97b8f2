//! Default values for `config.ini`.

use std::path::PathBuf;
use std::time::Duration;

use super::file::config_directory;
use super::settings::*;
use crate::credentials::DEFAULT_CREDENTIAL_TTL;
use crate::ingest::DEFAULT_SIGNATURE_HEADER;
use crate::service::{DEFAULT_ADDR, DEFAULT_SHUTDOWN_GRACE};
use crate::session::{DEFAULT_KEEPALIVE_INTERVAL, DEFAULT_STREAM_TIMEOUT};

/// Default log file name, placed in the config directory.
pub const DEFAULT_LOG_FILE: &str = "webhook-proxy.log";

/// Default stream timeout in seconds.
pub const DEFAULT_STREAM_TIMEOUT_SECS: u64 = DEFAULT_STREAM_TIMEOUT.as_secs();

/// Default keep-alive interval in seconds.
pub const DEFAULT_KEEPALIVE_INTERVAL_SECS: u64 = DEFAULT_KEEPALIVE_INTERVAL.as_secs();

/// Default token lifetime in seconds.
pub const DEFAULT_TOKEN_TTL_SECS: u64 = DEFAULT_CREDENTIAL_TTL.as_secs();

/// Default shutdown grace period in seconds.
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = DEFAULT_SHUTDOWN_GRACE.as_secs();

/// Default path of the log file (~/.webhook-proxy/webhook-proxy.log).
pub fn default_log_path() -> PathBuf {
    config_directory().join(DEFAULT_LOG_FILE)
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                addr: DEFAULT_ADDR,
                shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
            },
            stream: StreamSettings {
                timeout: Duration::from_secs(DEFAULT_STREAM_TIMEOUT_SECS),
                keepalive_interval: Duration::from_secs(DEFAULT_KEEPALIVE_INTERVAL_SECS),
            },
            tokens: TokenSettings {
                ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_SECS),
            },
            webhook: WebhookSettings {
                signature_header: DEFAULT_SIGNATURE_HEADER.to_string(),
            },
            metrics: MetricsSettings {
                token: None,
                allow_insecure: false,
            },
            logging: LoggingSettings {
                file: default_log_path(),
            },
        }
    }
}
