//! Webhook proxy - hand asynchronous webhook results to waiting clients.
//!
//! A webhook producer posts a signed result tagged with a `request_id`. A
//! client that asked for that result holds an open streaming response on
//! `GET /listen/{request_id}` and receives the payload and its signature
//! as soon as it lands, whichever side arrives first.
//!
//! # High-Level API
//!
//! The [`service`] module wires everything together:
//!
//! ```ignore
//! use webhook_proxy::service::{ProxyService, ServiceConfig};
//!
//! let service = ProxyService::new(ServiceConfig::default())?;
//! service.run().await?;
//! ```
//!
//! # Components
//!
//! - [`store`]: keyed rendezvous between stored payloads and waiting listeners
//! - [`credentials`]: per-request stream tokens
//! - [`ingest`]: validation of incoming webhooks
//! - [`session`]: the per-listener streaming state machine
//! - [`sweeper`]: periodic eviction of stale payloads and tokens
//! - [`metrics`]: event counters and the Prometheus report
//! - [`server`]: HTTP routes

pub mod config;
pub mod credentials;
pub mod ingest;
pub mod logging;
pub mod metrics;
pub mod server;
pub mod service;
pub mod session;
pub mod store;
pub mod sweeper;

/// Version of the webhook proxy library and CLI.
///
/// This is synchronized across all components in the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
