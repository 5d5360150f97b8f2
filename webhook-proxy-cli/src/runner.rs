//! CLI runner for common setup.
//!
//! Loads the config file and initializes logging so command handlers
//! start from the same state.

use std::path::{Path, PathBuf};

use crate::error::CliError;
use tracing::info;
use webhook_proxy::config::{config_file_path, ConfigFile};
use webhook_proxy::logging::{init_logging, LoggingGuard};

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    config: ConfigFile,
    config_path: PathBuf,
}

impl CliRunner {
    /// Load config from `config_path` (or the default path) and start logging.
    ///
    /// A missing file yields defaults.
    pub fn new(config_path: Option<&Path>, debug: bool) -> Result<Self, CliError> {
        let config_path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(config_file_path);
        let config = ConfigFile::load_from(&config_path)?;

        let logging_guard = init_logging(&config.logging.file, debug)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
            config_path,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("webhook-proxy v{}", webhook_proxy::VERSION);
        info!(
            config = %self.config_path.display(),
            log_file = %self.config.logging.file.display(),
            "webhook-proxy CLI: {} command",
            command
        );
    }
}
