//! Stored webhook payloads.

use bytes::Bytes;
use std::time::Instant;

/// A webhook payload waiting to be collected by a listener.
///
/// The content is reference counted, so cloning a record to hand it to a
/// listener does not copy the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadRecord {
    content: Bytes,
    signature: String,
    created_at: Instant,
}

impl PayloadRecord {
    /// Creates a record stamped with the current time.
    pub fn new(content: Bytes, signature: impl Into<String>) -> Self {
        Self {
            content,
            signature: signature.into(),
            created_at: Instant::now(),
        }
    }

    /// Raw webhook body as received.
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// Signature token supplied alongside the body.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// When the record was deposited.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Returns true if the record was created strictly before `cutoff`.
    pub fn is_older_than(&self, cutoff: Instant) -> bool {
        self.created_at < cutoff
    }
}
