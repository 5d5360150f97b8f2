//! Serve command - run the proxy until Ctrl+C or SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tracing::info;
use webhook_proxy::config::ConfigFile;
use webhook_proxy::service::{ProxyService, ServiceConfig, ServiceError};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the serve command.
#[derive(Debug, Default)]
pub struct ServeArgs {
    pub config_path: Option<PathBuf>,
    pub debug: bool,
    pub addr: Option<SocketAddr>,
    pub timeout: Option<u64>,
    pub metrics_token: Option<String>,
    pub allow_insecure_metrics: bool,
}

/// Run the serve command.
pub fn run(args: ServeArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(args.config_path.as_deref(), args.debug)?;
    runner.log_startup("serve");

    let config = build_service_config(runner.config(), &args);
    info!(
        addr = %config.addr(),
        timeout_secs = config.session().timeout.as_secs(),
        keepalive_secs = config.session().keepalive_interval.as_secs(),
        token_ttl_secs = config.token_ttl().as_secs(),
        "Starting webhook proxy"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("webhook-proxy")
        .build()
        .map_err(|e| CliError::ServiceCreation(ServiceError::RuntimeError(e.to_string())))?;

    runtime.block_on(async move {
        let service = ProxyService::new(config).map_err(CliError::ServiceCreation)?;

        let shutdown = service.shutdown_token();
        ctrlc::set_handler(move || {
            info!("Shutdown requested");
            shutdown.cancel();
        })
        .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

        println!("Listening on {} (Ctrl+C to stop)", service.config().addr());
        service.run().await.map_err(CliError::Serve)
    })?;

    info!("webhook-proxy stopped");
    Ok(())
}

/// Config file values with command-line overrides applied.
fn build_service_config(file: &ConfigFile, args: &ServeArgs) -> ServiceConfig {
    let mut builder = file.service_config_builder();
    if let Some(addr) = args.addr {
        builder = builder.addr(addr);
    }
    if let Some(timeout) = args.timeout {
        builder = builder.timeout(Duration::from_secs(timeout));
    }
    if let Some(token) = &args.metrics_token {
        builder = builder.metrics_token(token.clone());
    }
    if args.allow_insecure_metrics {
        builder = builder.allow_insecure_metrics(true);
    }
    builder.build()
}
