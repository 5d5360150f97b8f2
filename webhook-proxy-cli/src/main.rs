//! Webhook proxy CLI - command-line entry point.
//!
//! Loads `~/.webhook-proxy/config.ini` (or `--config`), applies flag
//! overrides and runs the proxy until interrupted.

mod commands;
mod error;
mod runner;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::serve::ServeArgs;

#[derive(Parser)]
#[command(name = "webhook-proxy")]
#[command(version = webhook_proxy::VERSION)]
#[command(about = "Deliver asynchronous webhook results to waiting clients", long_about = None)]
struct Cli {
    /// Path to config.ini (default: ~/.webhook-proxy/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging regardless of RUST_LOG
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the proxy (default)
    Serve {
        /// Listen address, e.g. 0.0.0.0:8000
        #[arg(long)]
        addr: Option<SocketAddr>,

        /// Seconds a listener waits for its webhook (0 closes immediately)
        #[arg(long)]
        timeout: Option<u64>,

        /// Bearer token required by GET /metrics (falls back to PROXY_METRICS_TOKEN)
        #[arg(long)]
        metrics_token: Option<String>,

        /// Serve /metrics without authentication when no token is set
        #[arg(long)]
        allow_insecure_metrics: bool,
    },

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let command = cli.command.unwrap_or(Commands::Serve {
        addr: None,
        timeout: None,
        metrics_token: None,
        allow_insecure_metrics: false,
    });

    let result = match command {
        Commands::Serve {
            addr,
            timeout,
            metrics_token,
            allow_insecure_metrics,
        } => commands::serve::run(ServeArgs {
            config_path: cli.config,
            debug: cli.debug,
            addr,
            timeout,
            metrics_token,
            allow_insecure_metrics,
        }),
        Commands::Init { force } => commands::init::run(cli.config, force),
    };

    if let Err(e) = result {
        e.exit();
    }
}
