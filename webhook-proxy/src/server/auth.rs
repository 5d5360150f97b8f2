//! Bearer token extraction and metrics endpoint protection.

use axum::http::{header, HeaderMap};
use subtle::ConstantTimeEq;

const BEARER_PREFIX: &str = "Bearer ";

/// Returns the token from an `Authorization` header.
///
/// The `Bearer ` prefix is stripped when present; a header without it is
/// taken as the raw token. A missing or non-UTF-8 header yields `None`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    if value.is_empty() {
        return None;
    }
    Some(value.strip_prefix(BEARER_PREFIX).unwrap_or(value))
}

/// Access policy for `GET /metrics`.
#[derive(Clone, PartialEq, Eq)]
pub enum MetricsAuth {
    /// Anyone may scrape.
    Open,
    /// Scrapers must present this bearer token.
    Bearer(String),
}

impl MetricsAuth {
    /// Returns true if the request may read metrics.
    ///
    /// Unlike listener auth, the `Bearer ` prefix is mandatory here.
    pub fn permits(&self, headers: &HeaderMap) -> bool {
        match self {
            MetricsAuth::Open => true,
            MetricsAuth::Bearer(expected) => headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix(BEARER_PREFIX))
                .is_some_and(|token| bool::from(token.as_bytes().ct_eq(expected.as_bytes()))),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, MetricsAuth::Open)
    }
}

impl std::fmt::Debug for MetricsAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricsAuth::Open => f.write_str("Open"),
            MetricsAuth::Bearer(_) => f.write_str("Bearer(<redacted>)"),
        }
    }
}
