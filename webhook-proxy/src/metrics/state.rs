//! Aggregated metrics state.
//!
//! The daemon owns the mutable copy of [`AggregatedState`] and updates it
//! from incoming events. Reporters read a shared clone.

/// Aggregated metrics state maintained by the daemon.
///
/// Counters only ever grow. Gauges are signed so that an unmatched release
/// shows up as a negative value instead of wrapping.
#[derive(Clone, Debug)]
pub struct AggregatedState {
    // =========================================================================
    // Webhook Metrics
    // =========================================================================
    /// Webhooks accepted by the ingest endpoint.
    pub webhooks_received: u64,
    /// Payloads evicted by the sweeper without being delivered.
    pub timed_out_webhooks: u64,

    // =========================================================================
    // Client Metrics
    // =========================================================================
    /// Listener sessions currently open.
    pub open_client_connections: i64,
    /// Listener sessions opened since start.
    pub client_connections_total: u64,
    /// Listener sessions that hit their deadline.
    pub timed_out_clients: u64,

    // =========================================================================
    // Token Metrics
    // =========================================================================
    /// Stream tokens issued and not yet released.
    pub active_tokens: i64,
}

impl Default for AggregatedState {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregatedState {
    /// Creates a new zeroed state.
    pub fn new() -> Self {
        Self {
            webhooks_received: 0,
            timed_out_webhooks: 0,
            open_client_connections: 0,
            client_connections_total: 0,
            timed_out_clients: 0,
            active_tokens: 0,
        }
    }
}
