//! Rendezvous storage for webhook payloads and waiting listeners.
//!
//! A payload and a listener for the same correlation key can arrive in
//! either order. The store keeps at most one undelivered payload and at most
//! one waiting listener per key and matches them up:
//!
//! ```text
//! webhook ──► put(key) ──┐
//!                        ├──► Slot { record, waiter } ──► wake listener
//! listener ──► subscribe(key) ┘
//! ```
//!
//! Both halves of a slot are guarded by the same shard lock, so a `put` can
//! never slip between a listener's "is it here yet?" check and its
//! registration.

mod record;
mod rendezvous;

pub use record::PayloadRecord;
pub use rendezvous::{RendezvousStore, StoreError, Subscription, WaitHandle};
