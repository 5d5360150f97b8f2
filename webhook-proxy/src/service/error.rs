//! Service error types.

use std::io;
use thiserror::Error;

/// Errors that can occur while starting or running the service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No Tokio runtime available to spawn background tasks
    #[error("Runtime error: {0}")]
    RuntimeError(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Failed to bind the listen address
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The HTTP server stopped with an I/O error
    #[error("HTTP server error: {0}")]
    Serve(#[from] io::Error),

    /// A background task panicked or was aborted
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The OS random source failed
    #[error("Cannot generate token: {0}")]
    SecretGeneration(#[source] rand::Error),
}
