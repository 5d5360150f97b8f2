//! In-memory rendezvous store.
//!
//! # Implementation
//!
//! Uses a single `DashMap` keyed by correlation key. Each slot holds the
//! optional payload and the optional waiter, so every operation on one key
//! runs under one shard lock and never observes a half-updated slot.
//! Waiters are `oneshot` channels that carry the record itself; a woken
//! listener never has to re-read a slot the sweeper may have just cleared.

use super::record::PayloadRecord;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Errors surfaced by the rendezvous store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No payload has been deposited for the key.
    #[error("no response for request {0}")]
    NotFound(String),

    /// The waiter was replaced by a newer listener or removed before a
    /// payload arrived.
    #[error("listener for request {0} was superseded")]
    Superseded(String),
}

/// A registered one-shot waiter.
struct Waiter {
    id: u64,
    tx: oneshot::Sender<PayloadRecord>,
}

#[derive(Default)]
struct Slot {
    record: Option<PayloadRecord>,
    waiter: Option<Waiter>,
}

impl Slot {
    fn is_empty(&self) -> bool {
        self.record.is_none() && self.waiter.is_none()
    }
}

/// Result of [`RendezvousStore::subscribe`].
#[derive(Debug)]
pub enum Subscription {
    /// The payload was already there; nothing was registered.
    Ready(PayloadRecord),
    /// No payload yet; wait on the handle.
    Waiting(WaitHandle),
}

/// Handle a listener blocks on until its payload is deposited.
///
/// Only one handle per key is live at a time. Registering a new one for the
/// same key makes this one resolve with [`StoreError::Superseded`].
#[derive(Debug)]
pub struct WaitHandle {
    key: String,
    id: u64,
    rx: oneshot::Receiver<PayloadRecord>,
}

impl WaitHandle {
    /// Correlation key this handle waits on.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Waits for the payload.
    ///
    /// Must not be polled again after it has returned.
    pub async fn wait(&mut self) -> Result<PayloadRecord, StoreError> {
        (&mut self.rx)
            .await
            .map_err(|_| StoreError::Superseded(self.key.clone()))
    }
}

/// Holds undelivered payloads and waiting listeners, one of each per key.
///
/// All methods take `&self` and are safe to call from any number of tasks.
/// Callers never hold a lock across calls.
pub struct RendezvousStore {
    slots: DashMap<String, Slot>,
    next_waiter_id: AtomicU64,
}

impl RendezvousStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            next_waiter_id: AtomicU64::new(1),
        }
    }

    /// Deposits a payload, replacing any earlier one for `key`.
    ///
    /// If a listener is waiting it is woken with the new record. The waiter
    /// is consumed, so it fires exactly once.
    pub fn put(&self, key: &str, content: Bytes, signature: impl Into<String>) {
        let record = PayloadRecord::new(content, signature);
        let mut slot = self.slots.entry(key.to_string()).or_default();
        slot.record = Some(record.clone());

        if let Some(waiter) = slot.waiter.take() {
            if waiter.tx.send(record).is_err() {
                debug!(request_id = key, "Listener went away before delivery");
            } else {
                debug!(request_id = key, "Woke waiting listener");
            }
        }
    }

    /// Returns the stored payload without removing it.
    pub fn get(&self, key: &str) -> Result<PayloadRecord, StoreError> {
        self.slots
            .get(key)
            .and_then(|slot| slot.record.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    /// Returns true if a payload is stored for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.slots
            .get(key)
            .map(|slot| slot.record.is_some())
            .unwrap_or(false)
    }

    /// Checks for a payload and, if there is none, registers a waiter.
    ///
    /// The check and the registration happen under the same lock, so a
    /// concurrent `put` is either seen here or wakes the returned handle.
    /// An earlier waiter for the same key is dropped (last listener wins).
    pub fn subscribe(&self, key: &str) -> Subscription {
        let mut slot = self.slots.entry(key.to_string()).or_default();

        if let Some(record) = slot.record.as_ref() {
            return Subscription::Ready(record.clone());
        }

        let id = self.next_waiter_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        if slot.waiter.replace(Waiter { id, tx }).is_some() {
            warn!(
                request_id = key,
                "Replacing existing listener, the previous one will not be woken"
            );
        }

        Subscription::Waiting(WaitHandle {
            key: key.to_string(),
            id,
            rx,
        })
    }

    /// Removes the waiter registered by `handle`, if it is still current.
    ///
    /// A handle that has been replaced never removes its successor.
    pub fn unsubscribe(&self, handle: &WaitHandle) {
        let now_empty = match self.slots.get_mut(&handle.key) {
            Some(mut slot) => {
                if slot.waiter.as_ref().is_some_and(|w| w.id == handle.id) {
                    slot.waiter = None;
                }
                slot.is_empty()
            }
            None => false,
        };

        if now_empty {
            self.slots.remove_if(&handle.key, |_, slot| slot.is_empty());
        }
    }

    /// Removes both the payload and any waiter for `key`. Idempotent.
    pub fn delete(&self, key: &str) {
        if self.slots.remove(key).is_some() {
            debug!(request_id = key, "Removed rendezvous entry");
        }
    }

    /// Returns the keys whose payload is older than `max_age`.
    ///
    /// Nothing is removed; the caller deletes each key so it can account for
    /// it first.
    pub fn sweep(&self, max_age: Duration) -> Vec<String> {
        match Instant::now().checked_sub(max_age) {
            Some(cutoff) => self.keys_created_before(cutoff),
            None => Vec::new(),
        }
    }

    /// Returns the keys whose payload was created strictly before `cutoff`.
    pub fn keys_created_before(&self, cutoff: Instant) -> Vec<String> {
        self.slots
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .record
                    .as_ref()
                    .is_some_and(|record| record.is_older_than(cutoff))
            })
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Drops waiters whose listener has gone away without unsubscribing.
    ///
    /// Returns the number of waiters removed.
    pub fn reap_orphaned_subscriptions(&self) -> usize {
        let mut reaped = 0;
        for mut entry in self.slots.iter_mut() {
            if entry.waiter.as_ref().is_some_and(|w| w.tx.is_closed()) {
                entry.waiter = None;
                reaped += 1;
            }
        }

        if reaped > 0 {
            self.slots.retain(|_, slot| !slot.is_empty());
        }
        reaped
    }

    /// Number of undelivered payloads.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| entry.record.is_some())
            .count()
    }

    /// Returns true if no payloads are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of listeners currently waiting.
    pub fn pending_subscriptions(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| entry.waiter.is_some())
            .count()
    }
}

impl Default for RendezvousStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RendezvousStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendezvousStore")
            .field("slots", &self.slots.len())
            .finish()
    }
}
