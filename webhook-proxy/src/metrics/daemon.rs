//! Metrics aggregation daemon.
//!
//! The [`MetricsDaemon`] runs as an independent async task that:
//!
//! 1. Receives events from the channel (sent by `MetricsClient`)
//! 2. Updates counters and gauges in `AggregatedState`
//! 3. Publishes state to a shared handle for reporters to read
//!
//! # Design Notes
//!
//! The daemon owns mutable state and is the only writer. Reporters access
//! state through a shared `RwLock` handle that the daemon refreshes after
//! every event, so a scrape sees each event as soon as it is processed.

use super::event::MetricEvent;
use super::state::AggregatedState;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Shared state handle for read-only access by reporters.
pub type SharedMetricsState = Arc<RwLock<AggregatedState>>;

/// The metrics aggregation daemon.
pub struct MetricsDaemon {
    /// Channel receiver for incoming events.
    rx: mpsc::UnboundedReceiver<MetricEvent>,

    /// Current aggregated state.
    state: AggregatedState,

    /// Shared state handle for reporters.
    shared_state: SharedMetricsState,
}

impl MetricsDaemon {
    /// Creates a new metrics daemon.
    ///
    /// # Arguments
    ///
    /// * `rx` - Channel receiver for incoming events
    pub fn new(rx: mpsc::UnboundedReceiver<MetricEvent>) -> Self {
        let state = AggregatedState::new();
        let shared_state = Arc::new(RwLock::new(state.clone()));

        Self {
            rx,
            state,
            shared_state,
        }
    }

    /// Returns a handle to the shared state.
    pub fn state_handle(&self) -> SharedMetricsState {
        Arc::clone(&self.shared_state)
    }

    /// Runs the daemon until shutdown is signaled.
    ///
    /// Events already queued when shutdown arrives are still applied before
    /// the final state publish.
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!("Metrics daemon starting");

        loop {
            tokio::select! {
                biased;

                // Check shutdown first
                _ = shutdown.cancelled() => {
                    tracing::info!("Metrics daemon shutting down");
                    break;
                }

                // Process incoming events
                Some(event) = self.rx.recv() => {
                    self.process_event(event);
                    self.update_shared_state();
                }
            }
        }

        while let Ok(event) = self.rx.try_recv() {
            self.process_event(event);
        }
        self.update_shared_state();
        tracing::debug!("Metrics daemon stopped");
    }

    /// Processes a single event, updating the aggregated state.
    fn process_event(&mut self, event: MetricEvent) {
        match event {
            MetricEvent::WebhookReceived => {
                self.state.webhooks_received += 1;
            }

            MetricEvent::ClientConnected => {
                self.state.open_client_connections += 1;
                self.state.client_connections_total += 1;
            }
            MetricEvent::ClientDisconnected => {
                self.state.open_client_connections -= 1;
            }
            MetricEvent::ClientTimedOut => {
                self.state.timed_out_clients += 1;
            }

            MetricEvent::WebhooksTimedOut { count } => {
                self.state.timed_out_webhooks += count;
            }

            MetricEvent::TokenIssued => {
                self.state.active_tokens += 1;
            }
            MetricEvent::TokensReleased { count } => {
                self.state.active_tokens -= i64::try_from(count).unwrap_or(i64::MAX);
            }
        }
    }

    /// Updates the shared state for reporters to read.
    fn update_shared_state(&self) {
        if let Ok(mut guard) = self.shared_state.write() {
            *guard = self.state.clone();
        }
    }
}

impl std::fmt::Debug for MetricsDaemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsDaemon")
            .field("webhooks_received", &self.state.webhooks_received)
            .field("open_client_connections", &self.state.open_client_connections)
            .field("active_tokens", &self.state.active_tokens)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
