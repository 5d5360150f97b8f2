//! Metrics collection and reporting system.
//!
//! This module provides a 3-layer architecture for metrics:
//!
//! 1. **Emission Layer** ([`MetricsClient`]) - Fire-and-forget event emission
//! 2. **Aggregation Layer** ([`MetricsDaemon`]) - Independent event processing
//! 3. **Reporting Layer** ([`MetricsReporter`]) - Transform data for presentation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  EMISSION LAYER                                                      │
//! │  MetricsClient (cloneable, cheap, fire-and-forget)                  │
//! │  - Used by: IngestHandler, StreamSession, Sweeper, token handler    │
//! └──────────────────────────────┬──────────────────────────────────────┘
//!                                │ MetricEvent (mpsc channel)
//!                                ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  AGGREGATION LAYER                                                   │
//! │  MetricsDaemon (independent async task)                              │
//! │  - Receives events from channel                                      │
//! │  - Updates counters/gauges in AggregatedState                       │
//! └──────────────────────────────┬──────────────────────────────────────┘
//!                                │ read-only access to state
//!                                ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  REPORTING LAYER                                                     │
//! │  MetricsReporter trait + PrometheusReporter implementation          │
//! │  - Renders text exposition for GET /metrics                         │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use webhook_proxy::metrics::{MetricsSystem, PrometheusReporter};
//!
//! let system = MetricsSystem::new(&tokio::runtime::Handle::current());
//!
//! let client = system.client();
//! client.webhook_received();
//!
//! let body = system.snapshot(&PrometheusReporter::new());
//!
//! system.shutdown().await;
//! ```

mod client;
mod daemon;
mod event;
mod reporter;
mod state;

pub use client::MetricsClient;
pub use daemon::{MetricsDaemon, SharedMetricsState};
pub use event::MetricEvent;
pub use reporter::{MetricsReporter, PrometheusReporter, METRIC_NAMESPACE};
pub use state::AggregatedState;

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Metrics System
// =============================================================================

/// The complete metrics system.
///
/// Top-level factory that creates and manages all metrics components:
///
/// - A [`MetricsClient`] for emitting events
/// - Access to state snapshots for reporting
/// - Graceful shutdown coordination
pub struct MetricsSystem {
    /// Client for emitting events.
    client: MetricsClient,

    /// Handle to the shared state for reporters.
    state_handle: SharedMetricsState,

    /// Handle to the daemon task.
    daemon_handle: Option<JoinHandle<()>>,

    /// Shutdown signal for the daemon.
    shutdown: CancellationToken,
}

impl MetricsSystem {
    /// Creates a new metrics system and starts the daemon.
    ///
    /// # Arguments
    ///
    /// * `runtime_handle` - Handle to the Tokio runtime for spawning the daemon
    pub fn new(runtime_handle: &tokio::runtime::Handle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = MetricsClient::new(tx);

        let daemon = MetricsDaemon::new(rx);
        let state_handle = daemon.state_handle();
        let shutdown = CancellationToken::new();

        let daemon_shutdown = shutdown.clone();
        let daemon_handle = Some(runtime_handle.spawn(async move {
            daemon.run(daemon_shutdown).await;
        }));

        Self {
            client,
            state_handle,
            daemon_handle,
            shutdown,
        }
    }

    /// Returns a clone of the metrics client.
    pub fn client(&self) -> MetricsClient {
        self.client.clone()
    }

    /// Returns a handle to the shared metrics state.
    pub fn state_handle(&self) -> SharedMetricsState {
        Arc::clone(&self.state_handle)
    }

    /// Generates a snapshot using the provided reporter.
    pub fn snapshot<R, O>(&self, reporter: &R) -> O
    where
        R: MetricsReporter<Output = O>,
    {
        report_shared(&self.state_handle, reporter)
    }

    /// Returns a copy of the current raw state.
    pub fn state_snapshot(&self) -> AggregatedState {
        read_shared(&self.state_handle)
    }

    /// Shuts down the metrics system gracefully.
    ///
    /// Signals the daemon to stop and waits for it to complete.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.daemon_handle.take() {
            let _ = handle.await;
        }
    }

    /// Returns true if the daemon is still running.
    pub fn is_running(&self) -> bool {
        self.daemon_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for MetricsSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsSystem")
            .field("running", &self.is_running())
            .finish()
    }
}

/// Runs `reporter` against a shared state handle.
///
/// A poisoned lock still holds the last published state, so it is read
/// rather than propagated.
pub fn report_shared<R, O>(handle: &SharedMetricsState, reporter: &R) -> O
where
    R: MetricsReporter<Output = O>,
{
    let guard = handle.read().unwrap_or_else(|poisoned| poisoned.into_inner());
    reporter.report(&guard)
}

fn read_shared(handle: &SharedMetricsState) -> AggregatedState {
    handle
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

// =============================================================================
// Tests
// =============================================================================
