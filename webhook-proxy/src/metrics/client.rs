//! Metrics emission layer.
//!
//! The [`MetricsClient`] provides a fire-and-forget interface for emitting
//! metric events. It's designed to be:
//!
//! - **Cheap to clone**: Backed by a channel sender
//! - **Fire-and-forget**: Never blocks, silently drops once the daemon is gone
//!
//! # Usage
//!
//! ```ignore
//! use webhook_proxy::metrics::MetricsClient;
//!
//! let client: MetricsClient = ...;
//!
//! client.webhook_received();
//! client.client_connected();
//! ```

use super::event::MetricEvent;
use tokio::sync::mpsc;

/// Client for emitting metric events to the metrics daemon.
///
/// All methods are fire-and-forget: they never block and ignore failures
/// (e.g., if the daemon has shut down), so request handling never waits on
/// metrics.
#[derive(Clone)]
pub struct MetricsClient {
    tx: mpsc::UnboundedSender<MetricEvent>,
}

impl MetricsClient {
    /// Creates a new metrics client with the given channel sender.
    pub fn new(tx: mpsc::UnboundedSender<MetricEvent>) -> Self {
        Self { tx }
    }

    /// Sends an event to the daemon (fire-and-forget).
    #[inline]
    fn send(&self, event: MetricEvent) {
        // Ignore send errors - daemon may have shut down
        let _ = self.tx.send(event);
    }

    // =========================================================================
    // Webhook Events
    // =========================================================================

    /// Records an accepted webhook.
    #[inline]
    pub fn webhook_received(&self) {
        self.send(MetricEvent::WebhookReceived);
    }

    // =========================================================================
    // Client Events
    // =========================================================================

    /// Records a listener entering its session.
    #[inline]
    pub fn client_connected(&self) {
        self.send(MetricEvent::ClientConnected);
    }

    /// Records a listener session ending.
    #[inline]
    pub fn client_disconnected(&self) {
        self.send(MetricEvent::ClientDisconnected);
    }

    /// Records a listener session timing out.
    #[inline]
    pub fn client_timed_out(&self) {
        self.send(MetricEvent::ClientTimedOut);
    }

    // =========================================================================
    // Sweeper Events
    // =========================================================================

    /// Records payloads evicted without delivery.
    ///
    /// # Arguments
    ///
    /// * `count` - Number of payloads evicted
    #[inline]
    pub fn webhooks_timed_out(&self, count: u64) {
        if count > 0 {
            self.send(MetricEvent::WebhooksTimedOut { count });
        }
    }

    // =========================================================================
    // Token Events
    // =========================================================================

    /// Records a stream token being issued.
    #[inline]
    pub fn token_issued(&self) {
        self.send(MetricEvent::TokenIssued);
    }

    /// Records stream tokens being revoked or expiring.
    #[inline]
    pub fn tokens_released(&self, count: u64) {
        if count > 0 {
            self.send(MetricEvent::TokensReleased { count });
        }
    }
}

impl std::fmt::Debug for MetricsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsClient")
            .field("connected", &!self.tx.is_closed())
            .finish()
    }
}
