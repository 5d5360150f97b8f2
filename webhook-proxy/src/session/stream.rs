//! Per-listener streaming session.
//!
//! A session subscribes to its correlation key and then races every way the
//! wait can end:
//!
//! ```text
//! Init ──subscribe──┬── Ready ─────────────────────────► deliver ─► Delivered
//!                   └── Waiting ─► Draining ─┬─ disconnect ────────► ClientDisconnected
//!                                            ├─ delivery ─► deliver ─► Delivered
//!                                            ├─ shutdown ─► "server gone" ─► Shutdown
//!                                            ├─ deadline ─► "server gone" ─► Timeout
//!                                            └─ keepalive ─► write ──(err)─► WriteFailed
//! ```
//!
//! Branches are checked in that order when several are ready at once.

use super::frame::Frame;
use super::sink::FrameSink;
use crate::credentials::CredentialStore;
use crate::metrics::MetricsClient;
use crate::store::{PayloadRecord, RendezvousStore, StoreError, Subscription, WaitHandle};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default time a listener may wait before being told the server is gone.
pub const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(120);

/// Default interval between keep-alive frames.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5);

const MIN_KEEPALIVE_INTERVAL: Duration = Duration::from_millis(1);
const FAR_FUTURE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Timing for listener sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Maximum wait measured from session start.
    pub timeout: Duration,
    /// Interval between keep-alive frames; the first is sent one interval in.
    pub keepalive_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_STREAM_TIMEOUT,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
        }
    }
}

/// Shared collaborators every session needs.
#[derive(Clone, Debug)]
pub struct SessionContext {
    pub store: Arc<RendezvousStore>,
    pub credentials: Arc<CredentialStore>,
    pub metrics: MetricsClient,
    pub config: SessionConfig,
    /// Cancelled when the service starts shutting down.
    pub shutdown: CancellationToken,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    Delivered,
    Timeout,
    ClientDisconnected,
    Shutdown,
    WriteFailed,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::Delivered => "delivered",
            TerminationReason::Timeout => "timeout",
            TerminationReason::ClientDisconnected => "client-disconnected",
            TerminationReason::Shutdown => "shutdown",
            TerminationReason::WriteFailed => "write-failed",
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Draining,
    Terminated(TerminationReason),
}

enum Signal {
    Disconnected,
    Delivery(Result<PayloadRecord, StoreError>),
    Shutdown,
    Deadline,
    KeepAlive,
}

/// One listener waiting on one correlation key.
pub struct StreamSession<S> {
    key: String,
    ctx: SessionContext,
    sink: S,
    state: SessionState,
}

impl<S: FrameSink> StreamSession<S> {
    pub fn new(ctx: SessionContext, key: impl Into<String>, sink: S) -> Self {
        Self {
            key: key.into(),
            ctx,
            sink,
            state: SessionState::Init,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs the session to completion.
    ///
    /// Only a delivered session removes the payload and revokes the
    /// credential. Every other outcome leaves them for the sweeper but
    /// always withdraws this session's own subscription.
    pub async fn run(&mut self) -> TerminationReason {
        let started = Instant::now();
        self.ctx.metrics.client_connected();
        info!(request_id = %self.key, "Client connected");

        let reason = match self.ctx.store.subscribe(&self.key) {
            Subscription::Ready(record) => self.deliver(record).await,
            Subscription::Waiting(handle) => {
                self.state = SessionState::Draining;
                self.drain(handle, started).await
            }
        };

        self.state = SessionState::Terminated(reason);
        self.ctx.metrics.client_disconnected();
        info!(
            request_id = %self.key,
            reason = %reason,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Client session ended"
        );
        reason
    }

    async fn drain(&mut self, mut handle: WaitHandle, started: Instant) -> TerminationReason {
        let deadline_at = started
            .checked_add(self.ctx.config.timeout)
            .unwrap_or_else(|| started + FAR_FUTURE);
        let deadline = tokio::time::sleep_until(deadline_at);
        tokio::pin!(deadline);

        let period = self.ctx.config.keepalive_interval.max(MIN_KEEPALIVE_INTERVAL);
        let mut keepalive = tokio::time::interval_at(started + period, period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut awaiting_delivery = true;

        let reason = loop {
            let signal = tokio::select! {
                biased;

                _ = self.sink.closed() => Signal::Disconnected,
                result = handle.wait(), if awaiting_delivery => Signal::Delivery(result),
                _ = self.ctx.shutdown.cancelled() => Signal::Shutdown,
                _ = &mut deadline => Signal::Deadline,
                _ = keepalive.tick() => Signal::KeepAlive,
            };

            match signal {
                Signal::Disconnected => {
                    debug!(request_id = %self.key, "Client went away while waiting");
                    break TerminationReason::ClientDisconnected;
                }
                Signal::Delivery(Ok(record)) => {
                    // The waiter was consumed by the put; nothing to unsubscribe.
                    return self.deliver(record).await;
                }
                Signal::Delivery(Err(err)) => {
                    warn!(
                        request_id = %self.key,
                        error = %err,
                        "Listener replaced, waiting for timeout or shutdown"
                    );
                    awaiting_delivery = false;
                }
                Signal::Shutdown => {
                    break self
                        .finish_with(Frame::ServerGone, TerminationReason::Shutdown)
                        .await;
                }
                Signal::Deadline => {
                    self.ctx.metrics.client_timed_out();
                    break self
                        .finish_with(Frame::ServerGone, TerminationReason::Timeout)
                        .await;
                }
                Signal::KeepAlive => {
                    if let Err(err) = self.sink.send_frame(Frame::KeepAlive).await {
                        debug!(request_id = %self.key, error = %err, "Keep-alive write failed");
                        break TerminationReason::WriteFailed;
                    }
                }
            }
        };

        self.ctx.store.unsubscribe(&handle);
        reason
    }

    async fn finish_with(&mut self, frame: Frame, reason: TerminationReason) -> TerminationReason {
        match self.sink.send_frame(frame).await {
            Ok(()) => reason,
            Err(err) => {
                debug!(request_id = %self.key, error = %err, "Final frame write failed");
                TerminationReason::WriteFailed
            }
        }
    }

    async fn deliver(&mut self, record: PayloadRecord) -> TerminationReason {
        let frames = [
            Frame::Data(record.content().clone()),
            Frame::Signature(record.signature().to_string()),
            Frame::EndOfTransmission,
        ];

        for frame in frames {
            if let Err(err) = self.sink.send_frame(frame).await {
                warn!(request_id = %self.key, error = %err, "Failed to deliver webhook");
                return TerminationReason::WriteFailed;
            }
        }

        self.ctx.store.delete(&self.key);
        if self.ctx.credentials.revoke(&self.key) {
            self.ctx.metrics.tokens_released(1);
        }
        info!(request_id = %self.key, "Webhook delivered");
        TerminationReason::Delivered
    }
}

impl<S> fmt::Debug for StreamSession<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSession")
            .field("key", &self.key)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricEvent;
    use crate::session::sink::WriteError;
    use bytes::Bytes;
    use futures::future::BoxFuture;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    // ─────────────────────────────────────────────────────────────────────────
    // Test sink
    // ─────────────────────────────────────────────────────────────────────────

    #[derive(Clone, Default)]
    struct RecordingSink {
        frames: Arc<Mutex<Vec<Frame>>>,
        gone: CancellationToken,
        fail_writes: Arc<std::sync::atomic::AtomicBool>,
    }

    impl RecordingSink {
        fn frames(&self) -> Vec<Frame> {
            self.frames.lock().unwrap().clone()
        }

        fn fail_writes(&self) {
            self.fail_writes
                .store(true, std::sync::atomic::Ordering::SeqCst);
        }
    }

    impl FrameSink for RecordingSink {
        fn send_frame(&mut self, frame: Frame) -> BoxFuture<'_, Result<(), WriteError>> {
            Box::pin(async move {
                if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
                    return Err(WriteError::Closed);
                }
                self.frames.lock().unwrap().push(frame);
                Ok(())
            })
        }

        fn closed(&self) -> BoxFuture<'_, ()> {
            Box::pin(self.gone.cancelled())
        }
    }

    struct Harness {
        ctx: SessionContext,
        events: mpsc::UnboundedReceiver<MetricEvent>,
    }

    impl Harness {
        fn new(timeout: Duration, keepalive_interval: Duration) -> Self {
            let (tx, events) = mpsc::unbounded_channel();
            let ctx = SessionContext {
                store: Arc::new(RendezvousStore::new()),
                credentials: Arc::new(CredentialStore::default()),
                metrics: MetricsClient::new(tx),
                config: SessionConfig {
                    timeout,
                    keepalive_interval,
                },
                shutdown: CancellationToken::new(),
            };
            Self { ctx, events }
        }

        fn drain_events(&mut self) -> Vec<MetricEvent> {
            let mut out = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                out.push(event);
            }
            out
        }
    }

    fn delivered_frames(body: &'static str, signature: &str) -> Vec<Frame> {
        vec![
            Frame::Data(Bytes::from_static(body.as_bytes())),
            Frame::Signature(signature.to_string()),
            Frame::EndOfTransmission,
        ]
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Termination reasons
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_record_present_is_delivered_immediately() {
        let mut h = Harness::new(Duration::from_secs(5), Duration::from_secs(5));
        h.ctx.credentials.issue("r1").unwrap();
        h.ctx
            .store
            .put("r1", Bytes::from_static(br#"{"request_id":"r1"}"#), "sig");
        let sink = RecordingSink::default();

        let mut session = StreamSession::new(h.ctx.clone(), "r1", sink.clone());
        let reason = session.run().await;

        assert_eq!(reason, TerminationReason::Delivered);
        assert_eq!(
            session.state(),
            SessionState::Terminated(TerminationReason::Delivered)
        );
        assert_eq!(sink.frames(), delivered_frames(r#"{"request_id":"r1"}"#, "sig"));
        assert!(!h.ctx.store.contains("r1"));
        assert!(h.ctx.credentials.lookup("r1").is_none());
        assert_eq!(
            h.drain_events(),
            vec![
                MetricEvent::ClientConnected,
                MetricEvent::TokensReleased { count: 1 },
                MetricEvent::ClientDisconnected,
            ]
        );
    }

    #[tokio::test]
    async fn test_waiting_session_woken_by_put() {
        let h = Harness::new(Duration::from_secs(5), Duration::from_secs(5));
        h.ctx.credentials.issue("r1").unwrap();
        let sink = RecordingSink::default();

        let ctx = h.ctx.clone();
        let session_sink = sink.clone();
        let task = tokio::spawn(async move {
            let mut session = StreamSession::new(ctx, "r1", session_sink);
            session.run().await
        });

        while h.ctx.store.pending_subscriptions() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        h.ctx.store.put("r1", Bytes::from_static(b"hello"), "s1");

        let reason = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reason, TerminationReason::Delivered);
        assert_eq!(sink.frames(), delivered_frames("hello", "s1"));
        assert!(!h.ctx.store.contains("r1"));
        assert!(h.ctx.credentials.lookup("r1").is_none());
    }

    #[tokio::test]
    async fn test_deadline_sends_server_gone() {
        let mut h = Harness::new(Duration::from_millis(120), Duration::from_millis(50));
        h.ctx.credentials.issue("r1").unwrap();
        let sink = RecordingSink::default();

        let mut session = StreamSession::new(h.ctx.clone(), "r1", sink.clone());
        let reason = session.run().await;

        assert_eq!(reason, TerminationReason::Timeout);
        let frames = sink.frames();
        assert_eq!(frames.last(), Some(&Frame::ServerGone));
        assert!(frames[..frames.len() - 1]
            .iter()
            .all(|f| *f == Frame::KeepAlive));
        assert!(!frames.is_empty());

        // Credential kept for the sweeper, subscription withdrawn
        assert!(h.ctx.credentials.lookup("r1").is_some());
        assert_eq!(h.ctx.store.pending_subscriptions(), 0);

        let events = h.drain_events();
        assert!(events.contains(&MetricEvent::ClientTimedOut));
        assert_eq!(events.last(), Some(&MetricEvent::ClientDisconnected));
    }

    #[tokio::test]
    async fn test_keepalives_sent_while_waiting() {
        let h = Harness::new(Duration::from_millis(230), Duration::from_millis(50));
        let sink = RecordingSink::default();

        let mut session = StreamSession::new(h.ctx.clone(), "r1", sink.clone());
        session.run().await;

        let keepalives = sink
            .frames()
            .iter()
            .filter(|f| **f == Frame::KeepAlive)
            .count();
        assert!(keepalives >= 3, "got {keepalives} keep-alives");
    }

    #[tokio::test]
    async fn test_shutdown_sends_server_gone() {
        let h = Harness::new(Duration::from_secs(5), Duration::from_secs(5));
        let sink = RecordingSink::default();

        let ctx = h.ctx.clone();
        let session_sink = sink.clone();
        let task = tokio::spawn(async move {
            let mut session = StreamSession::new(ctx, "r1", session_sink);
            session.run().await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        h.ctx.shutdown.cancel();

        let reason = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reason, TerminationReason::Shutdown);
        assert_eq!(sink.frames(), vec![Frame::ServerGone]);
        assert_eq!(h.ctx.store.pending_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_client_disconnect_writes_nothing() {
        let mut h = Harness::new(Duration::from_secs(5), Duration::from_secs(5));
        let sink = RecordingSink::default();

        let ctx = h.ctx.clone();
        let session_sink = sink.clone();
        let task = tokio::spawn(async move {
            let mut session = StreamSession::new(ctx, "r1", session_sink);
            session.run().await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        sink.gone.cancel();

        let reason = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reason, TerminationReason::ClientDisconnected);
        assert!(sink.frames().is_empty());
        assert_eq!(h.ctx.store.pending_subscriptions(), 0);
        assert_eq!(
            h.drain_events(),
            vec![MetricEvent::ClientConnected, MetricEvent::ClientDisconnected]
        );
    }

    #[tokio::test]
    async fn test_already_closed_client_disconnects() {
        let h = Harness::new(Duration::from_secs(5), Duration::from_secs(5));
        let sink = RecordingSink::default();
        sink.gone.cancel();

        let ctx = h.ctx.clone();
        let session_sink = sink.clone();
        let task = tokio::spawn(async move {
            let mut session = StreamSession::new(ctx, "r1", session_sink);
            session.run().await
        });

        let reason = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reason, TerminationReason::ClientDisconnected);
        assert!(sink.frames().is_empty());
    }

    #[tokio::test]
    async fn test_keepalive_write_failure_terminates() {
        let h = Harness::new(Duration::from_secs(5), Duration::from_millis(20));
        h.ctx.credentials.issue("r1").unwrap();
        let sink = RecordingSink::default();
        sink.fail_writes();

        let mut session = StreamSession::new(h.ctx.clone(), "r1", sink.clone());
        let reason = tokio::time::timeout(Duration::from_secs(1), session.run())
            .await
            .unwrap();

        assert_eq!(reason, TerminationReason::WriteFailed);
        assert!(h.ctx.credentials.lookup("r1").is_some());
        assert_eq!(h.ctx.store.pending_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_delivery_write_failure_leaves_record() {
        let h = Harness::new(Duration::from_secs(5), Duration::from_secs(5));
        h.ctx.credentials.issue("r1").unwrap();
        h.ctx.store.put("r1", Bytes::from_static(b"x"), "s");
        let sink = RecordingSink::default();
        sink.fail_writes();

        let mut session = StreamSession::new(h.ctx.clone(), "r1", sink);
        let reason = session.run().await;

        assert_eq!(reason, TerminationReason::WriteFailed);
        assert!(h.ctx.store.contains("r1"));
        assert!(h.ctx.credentials.lookup("r1").is_some());
    }

    #[tokio::test]
    async fn test_superseded_session_keeps_draining_until_deadline() {
        let h = Harness::new(Duration::from_millis(150), Duration::from_secs(5));
        let first_sink = RecordingSink::default();
        let second_sink = RecordingSink::default();

        let ctx = h.ctx.clone();
        let sink = first_sink.clone();
        let first = tokio::spawn(async move {
            let mut session = StreamSession::new(ctx, "r1", sink);
            session.run().await
        });
        while h.ctx.store.pending_subscriptions() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let ctx = h.ctx.clone();
        let sink = second_sink.clone();
        let second = tokio::spawn(async move {
            let mut session = StreamSession::new(ctx, "r1", sink);
            session.run().await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        h.ctx.store.put("r1", Bytes::from_static(b"late"), "sig");

        assert_eq!(second.await.unwrap(), TerminationReason::Delivered);
        assert_eq!(second_sink.frames(), delivered_frames("late", "sig"));

        assert_eq!(first.await.unwrap(), TerminationReason::Timeout);
        assert_eq!(first_sink.frames(), vec![Frame::ServerGone]);
    }

    #[test]
    fn test_termination_reason_display() {
        assert_eq!(TerminationReason::Delivered.to_string(), "delivered");
        assert_eq!(
            TerminationReason::ClientDisconnected.to_string(),
            "client-disconnected"
        );
        assert_eq!(TerminationReason::WriteFailed.as_str(), "write-failed");
    }

    #[test]
    fn test_new_session_starts_in_init() {
        let h = Harness::new(Duration::from_secs(1), Duration::from_secs(1));
        let session = StreamSession::new(h.ctx, "r1", RecordingSink::default());

        assert_eq!(session.state(), SessionState::Init);
        assert_eq!(session.key(), "r1");
    }
}
