//! High-level service facade for the proxy.
//!
//! This module provides a simplified API that encapsulates all component
//! wiring and configuration, following the Facade pattern.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use webhook_proxy::service::{ProxyService, ServiceConfig};
//!
//! let config = ServiceConfig::builder()
//!     .timeout(Duration::from_secs(120))
//!     .build();
//!
//! let service = ProxyService::new(config)?;
//! service.run().await?;
//! ```

mod config;
mod error;
mod facade;

pub use config::{
    ServiceConfig, ServiceConfigBuilder, DEFAULT_ADDR, DEFAULT_SHUTDOWN_GRACE, METRICS_TOKEN_ENV,
};
pub use error::ServiceError;
pub use facade::ProxyService;
