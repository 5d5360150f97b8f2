//! Webhook ingestion.
//!
//! Validates an inbound webhook and deposits it in the rendezvous store,
//! waking the listener for its `request_id` if one is already waiting.

use std::sync::Arc;

use bytes::Bytes;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::metrics::MetricsClient;
use crate::store::RendezvousStore;

/// Header carrying the webhook signature unless configured otherwise.
pub const DEFAULT_SIGNATURE_HEADER: &str = "X-BASETEN-SIGNATURE";

/// Reasons a webhook is rejected. Nothing is stored for any of them.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("missing webhook signature")]
    MissingSignature,

    #[error("webhook body is not valid JSON: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("webhook body has no request_id")]
    MissingRequestId,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    request_id: Option<String>,
}

/// Accepts webhook payloads into the store.
#[derive(Clone, Debug)]
pub struct IngestHandler {
    store: Arc<RendezvousStore>,
    metrics: MetricsClient,
}

impl IngestHandler {
    pub fn new(store: Arc<RendezvousStore>, metrics: MetricsClient) -> Self {
        Self { store, metrics }
    }

    /// Validates and stores a webhook. Returns its `request_id`.
    ///
    /// The body is stored verbatim; only `request_id` is read from it.
    pub fn ingest(&self, signature: Option<&str>, body: Bytes) -> Result<String, IngestError> {
        let signature = signature
            .filter(|s| !s.is_empty())
            .ok_or(IngestError::MissingSignature)?;

        let envelope: Envelope = serde_json::from_slice(&body)?;
        let request_id = envelope
            .request_id
            .filter(|id| !id.is_empty())
            .ok_or(IngestError::MissingRequestId)?;

        debug!(request_id = %request_id, bytes = body.len(), "Storing webhook");
        self.store.put(&request_id, body, signature);
        self.metrics.webhook_received();
        info!(request_id = %request_id, "Webhook received");

        Ok(request_id)
    }
}
