//! Metrics reporting layer.
//!
//! Reporters read from the shared state handle and produce output in a
//! presentation format. [`PrometheusReporter`] renders the text exposition
//! format served at `GET /metrics`.

use super::state::AggregatedState;
use std::fmt::Write;

// =============================================================================
// Reporter Trait
// =============================================================================

/// Trait for metrics reporters.
///
/// Reporters transform raw aggregated state into presentation formats.
/// Each reporter produces a specific output type tailored to its use case.
pub trait MetricsReporter {
    /// The output type produced by this reporter.
    type Output;

    /// Transforms aggregated state into the output format.
    fn report(&self, state: &AggregatedState) -> Self::Output;
}

// =============================================================================
// Prometheus Reporter
// =============================================================================

/// Metric name prefix shared by every exported series.
pub const METRIC_NAMESPACE: &str = "webhook_proxy";

#[derive(Clone, Copy)]
enum Kind {
    Counter,
    Gauge,
}

impl Kind {
    fn as_str(self) -> &'static str {
        match self {
            Kind::Counter => "counter",
            Kind::Gauge => "gauge",
        }
    }
}

/// Reporter that renders the Prometheus text exposition format.
#[derive(Clone, Debug)]
pub struct PrometheusReporter {
    namespace: String,
}

impl PrometheusReporter {
    /// Creates a reporter using the default `webhook_proxy` namespace.
    pub fn new() -> Self {
        Self {
            namespace: METRIC_NAMESPACE.to_string(),
        }
    }

    /// Creates a reporter with a custom metric namespace.
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    fn write_metric(&self, out: &mut String, name: &str, help: &str, kind: Kind, value: i64) {
        let full = format!("{}_{}", self.namespace, name);
        // Writing into a String cannot fail
        let _ = writeln!(out, "# HELP {} {}", full, help);
        let _ = writeln!(out, "# TYPE {} {}", full, kind.as_str());
        let _ = writeln!(out, "{} {}", full, value);
    }
}

impl Default for PrometheusReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn as_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl MetricsReporter for PrometheusReporter {
    type Output = String;

    fn report(&self, state: &AggregatedState) -> String {
        let mut out = String::with_capacity(1024);

        self.write_metric(
            &mut out,
            "webhooks_received_total",
            "Total number of webhooks received",
            Kind::Counter,
            as_i64(state.webhooks_received),
        );
        self.write_metric(
            &mut out,
            "open_client_connections",
            "Number of currently open client connections",
            Kind::Gauge,
            state.open_client_connections,
        );
        self.write_metric(
            &mut out,
            "client_connections_total",
            "Total number of client connections",
            Kind::Counter,
            as_i64(state.client_connections_total),
        );
        self.write_metric(
            &mut out,
            "timed_out_clients_total",
            "Total number of clients that timed out waiting for a webhook",
            Kind::Counter,
            as_i64(state.timed_out_clients),
        );
        self.write_metric(
            &mut out,
            "timed_out_webhooks_total",
            "Total number of webhooks evicted before a client collected them",
            Kind::Counter,
            as_i64(state.timed_out_webhooks),
        );
        self.write_metric(
            &mut out,
            "active_tokens",
            "Number of stream tokens currently issued",
            Kind::Gauge,
            state.active_tokens,
        );

        out
    }
}
