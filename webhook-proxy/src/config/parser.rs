//! INI parsing for `config.ini`.
//!
//! Values present in the file are overlaid on [`ConfigFile::default`];
//! anything missing keeps its default.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use ini::Ini;

use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an INI document into a [`ConfigFile`].
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    if let Some(section) = ini.section(Some("server")) {
        if let Some(v) = section.get("addr") {
            config.server.addr =
                v.trim()
                    .parse::<SocketAddr>()
                    .map_err(|_| ConfigFileError::InvalidValue {
                        section: "server".to_string(),
                        key: "addr".to_string(),
                        value: v.to_string(),
                        reason: "must be host:port, e.g. 0.0.0.0:8000".to_string(),
                    })?;
        }
        if let Some(v) = section.get("shutdown_grace") {
            config.server.shutdown_grace = parse_secs("server", "shutdown_grace", v)?;
        }
    }

    if let Some(section) = ini.section(Some("stream")) {
        if let Some(v) = section.get("timeout") {
            config.stream.timeout = parse_secs("stream", "timeout", v)?;
        }
        if let Some(v) = section.get("keepalive_interval") {
            let interval = parse_secs("stream", "keepalive_interval", v)?;
            if interval.is_zero() {
                return Err(ConfigFileError::InvalidValue {
                    section: "stream".to_string(),
                    key: "keepalive_interval".to_string(),
                    value: v.to_string(),
                    reason: "must be at least 1 second".to_string(),
                });
            }
            config.stream.keepalive_interval = interval;
        }
    }

    if let Some(section) = ini.section(Some("tokens")) {
        if let Some(v) = section.get("ttl") {
            let ttl = parse_secs("tokens", "ttl", v)?;
            if ttl.is_zero() {
                return Err(ConfigFileError::InvalidValue {
                    section: "tokens".to_string(),
                    key: "ttl".to_string(),
                    value: v.to_string(),
                    reason: "must be at least 1 second".to_string(),
                });
            }
            config.tokens.ttl = ttl;
        }
    }

    if let Some(section) = ini.section(Some("webhook")) {
        if let Some(v) = section.get("signature_header") {
            let name = v.trim();
            if name.is_empty() {
                return Err(ConfigFileError::InvalidValue {
                    section: "webhook".to_string(),
                    key: "signature_header".to_string(),
                    value: v.to_string(),
                    reason: "must not be empty".to_string(),
                });
            }
            config.webhook.signature_header = name.to_string();
        }
    }

    if let Some(section) = ini.section(Some("metrics")) {
        if let Some(v) = section.get("token") {
            let v = v.trim();
            if !v.is_empty() {
                config.metrics.token = Some(v.to_string());
            }
        }
        if let Some(v) = section.get("allow_insecure") {
            config.metrics.allow_insecure = parse_bool(v);
        }
    }

    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

/// Parse a whole number of seconds.
fn parse_secs(section: &str, key: &str, value: &str) -> Result<Duration, ConfigFileError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: "must be a whole number of seconds".to_string(),
        })
}

/// Parse a boolean value from string.
pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
