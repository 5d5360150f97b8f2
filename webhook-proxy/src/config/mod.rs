//! Configuration file support.
//!
//! The proxy reads `~/.webhook-proxy/config.ini` on startup. Every key is
//! optional; missing keys fall back to [`defaults`]. Command-line flags are
//! applied on top via [`ConfigFile::service_config_builder`].
//!
//! # Example
//!
//! ```
//! use webhook_proxy::config::ConfigFile;
//!
//! let config = ConfigFile::default();
//! let service = config.to_service_config();
//! assert_eq!(service.signature_header(), "X-BASETEN-SIGNATURE");
//! ```

pub mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::{default_log_path, DEFAULT_LOG_FILE};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    ConfigFile, LoggingSettings, MetricsSettings, ServerSettings, StreamSettings, TokenSettings,
    WebhookSettings,
};
