//! Metric events for the emission layer.
//!
//! Events are fire-and-forget: producers send them to the daemon without
//! waiting for acknowledgment.
//!
//! # Event Granularity
//!
//! - Webhook events: per accepted ingest call
//! - Client events: per listener connection
//! - Sweep events: per sweeper pass, carrying a count
//! - Token events: per credential issued or released

/// Events emitted by proxy components to the metrics daemon.
///
/// Events are processed sequentially by the daemon to keep counters and
/// gauges consistent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MetricEvent {
    // =========================================================================
    // Webhook Events
    // =========================================================================
    /// A webhook payload was accepted and stored.
    WebhookReceived,

    // =========================================================================
    // Client Events
    // =========================================================================
    /// A listener connection entered its streaming session.
    ClientConnected,

    /// A listener session ended, for any reason.
    ClientDisconnected,

    /// A listener session hit its deadline before delivery.
    ClientTimedOut,

    // =========================================================================
    // Sweeper Events
    // =========================================================================
    /// Undelivered payloads evicted by the sweeper.
    WebhooksTimedOut {
        /// Number of payloads evicted in the pass.
        count: u64,
    },

    // =========================================================================
    // Token Events
    // =========================================================================
    /// A stream token was issued.
    TokenIssued,

    /// Stream tokens were revoked or expired.
    TokensReleased {
        /// Number of tokens released.
        count: u64,
    },
}
