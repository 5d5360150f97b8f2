//! Init command - write a default config file.

use std::path::{Path, PathBuf};

use webhook_proxy::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Run the init command.
pub fn run(config_path: Option<PathBuf>, force: bool) -> Result<(), CliError> {
    let path = config_path.unwrap_or_else(config_file_path);
    if write_default(&path, force)? {
        println!("Wrote default configuration to {}", path.display());
    } else {
        println!(
            "Configuration already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    Ok(())
}

/// Returns `true` if a file was written.
fn write_default(path: &Path, force: bool) -> Result<bool, CliError> {
    if force {
        ConfigFile::default().save_to(path)?;
        return Ok(true);
    }
    Ok(ConfigFile::ensure_exists_at(path)?)
}
