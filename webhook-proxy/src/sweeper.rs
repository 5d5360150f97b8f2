//! Background eviction daemon.
//!
//! The sweeper runs in a background task and on every tick:
//! 1. Evicts payloads nobody collected within the stream timeout
//! 2. Drops expired stream credentials
//! 3. Reaps subscriptions whose listener vanished without cleanup
//!
//! The passes are independent; each one only touches entries that are
//! already stale, so running them alongside live sessions is safe.
//!
//! # Example
//!
//! ```ignore
//! use webhook_proxy::sweeper::Sweeper;
//!
//! let sweeper = Sweeper::new(store, credentials, metrics, Duration::from_secs(120));
//! tokio::spawn(sweeper.run(shutdown_token));
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::credentials::CredentialStore;
use crate::metrics::MetricsClient;
use crate::store::RendezvousStore;

/// Shortest interval between sweeps.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Counts from one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Payloads evicted without delivery.
    pub webhooks_evicted: usize,
    /// Credentials removed after expiring.
    pub credentials_expired: usize,
    /// Waiters dropped because their listener was gone.
    pub subscriptions_reaped: usize,
}

impl SweepReport {
    /// Returns true if the sweep removed nothing.
    pub fn is_empty(&self) -> bool {
        self.webhooks_evicted == 0 && self.credentials_expired == 0 && self.subscriptions_reaped == 0
    }
}

/// Background daemon evicting stale store entries and credentials.
pub struct Sweeper {
    store: Arc<RendezvousStore>,
    credentials: Arc<CredentialStore>,
    metrics: MetricsClient,

    /// Payloads older than this are evicted.
    retention: Duration,

    /// Interval between sweeps.
    interval: Duration,
}

impl Sweeper {
    /// Creates a sweeper that retains payloads for `retention` and sweeps
    /// at the same interval.
    pub fn new(
        store: Arc<RendezvousStore>,
        credentials: Arc<CredentialStore>,
        metrics: MetricsClient,
        retention: Duration,
    ) -> Self {
        Self {
            store,
            credentials,
            metrics,
            retention,
            interval: retention.max(MIN_SWEEP_INTERVAL),
        }
    }

    /// Sets a custom sweep interval (clamped to [`MIN_SWEEP_INTERVAL`]).
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_SWEEP_INTERVAL);
        self
    }

    /// Returns the interval between sweeps.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs one sweep over the store and the credentials.
    pub fn sweep_once(&self) -> SweepReport {
        let stale = self.store.sweep(self.retention);
        for key in &stale {
            debug!(request_id = %key, "Evicting uncollected webhook");
            self.store.delete(key);
        }
        self.metrics.webhooks_timed_out(stale.len() as u64);

        let credentials_expired = self.credentials.sweep_expired();
        self.metrics.tokens_released(credentials_expired as u64);

        let subscriptions_reaped = self.store.reap_orphaned_subscriptions();

        SweepReport {
            webhooks_evicted: stale.len(),
            credentials_expired,
            subscriptions_reaped,
        }
    }

    /// Runs the sweeper until shutdown is signalled.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            retention_secs = self.retention.as_secs(),
            "Sweeper starting"
        );

        let mut interval = tokio::time::interval(self.interval);
        // Skip the first immediate tick
        interval.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Sweeper shutting down");
                    break;
                }

                _ = interval.tick() => {
                    let report = self.sweep_once();
                    if report.is_empty() {
                        debug!("Sweep found nothing to evict");
                    } else {
                        info!(
                            webhooks = report.webhooks_evicted,
                            credentials = report.credentials_expired,
                            subscriptions = report.subscriptions_reaped,
                            "Sweep evicted stale entries"
                        );
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for Sweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sweeper")
            .field("retention", &self.retention)
            .field("interval", &self.interval)
            .finish()
    }
}
