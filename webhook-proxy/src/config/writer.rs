//! Serialization of [`ConfigFile`] into a commented `config.ini`.

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let metrics_token = config.metrics.token.as_deref().unwrap_or("");
    let allow_insecure = if config.metrics.allow_insecure {
        "true"
    } else {
        "false"
    };

    format!(
        r#"# Webhook proxy configuration
# Durations are whole seconds.

[server]
# Address to listen on (host:port)
addr = {addr}
# Seconds listeners get to receive their final frame on shutdown
shutdown_grace = {shutdown_grace}

[stream]
# Seconds a listener waits for its webhook; also how long an
# uncollected webhook is kept. 0 closes streams immediately.
timeout = {timeout}
# Seconds between keep-alive frames
keepalive_interval = {keepalive}

[tokens]
# Lifetime of stream tokens issued by POST /token
ttl = {ttl}

[webhook]
# Header carrying the webhook signature
signature_header = {signature_header}

[metrics]
# Bearer token for GET /metrics. Falls back to PROXY_METRICS_TOKEN.
# When neither is set a random token is generated and logged.
token = {metrics_token}
# Serve /metrics without authentication when no token is set
allow_insecure = {allow_insecure}

[logging]
file = {log_file}
"#,
        addr = config.server.addr,
        shutdown_grace = config.server.shutdown_grace.as_secs(),
        timeout = config.stream.timeout.as_secs(),
        keepalive = config.stream.keepalive_interval.as_secs(),
        ttl = config.tokens.ttl.as_secs(),
        signature_header = config.webhook.signature_header,
        metrics_token = metrics_token,
        allow_insecure = allow_insecure,
        log_file = config.logging.file.display(),
    )
}
