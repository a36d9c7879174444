//! Reloader daemon.
//!
//! Keeps every resource listed in the config file loaded and fresh, and
//! reports each reload through logs and metrics.
//!
//! # Architecture Overview
//!
//! ```text
//!   config file ──▶ lifecycle::startup ──▶ ServiceHandle<Document> per resource
//!                                              │
//!                   ┌──────────────────────────┴───────────────┐
//!                   ▼                                          ▼
//!           PollingLoader (interval/cron)          ListeningLoader (notify)
//!                   │                                          │
//!                   └─────────▶ ReloadRuntime (bounded) ◀──────┘
//!                                     │
//!                                     ▼
//!                   source ─▶ actions ─▶ translator ─▶ publish
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use reloader::config::load_config;
use reloader::lifecycle::signals::wait_for_termination;
use reloader::lifecycle::start_services;
use reloader::observability::{logging, metrics};
use reloader::ReloadRuntime;

#[derive(Debug, Parser)]
#[command(name = "reloader", version, about = "Keep external resources hot-reloaded")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "reloader.toml")]
    config: PathBuf,

    /// Override the configured log level.
    #[arg(long)]
    log_level: Option<String>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", cli.config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    if cli.check {
        println!(
            "{}: ok, {} service(s)",
            cli.config.display(),
            config.services.len()
        );
        return ExitCode::SUCCESS;
    }

    let level = cli
        .log_level
        .as_deref()
        .unwrap_or(&config.observability.log_level);
    if let Err(e) = logging::init_logging(level) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        services = config.services.len(),
        max_concurrent_reloads = config.runtime.max_concurrent_reloads,
        "reloader starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let runtime = match ReloadRuntime::new(&config.runtime) {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create reload runtime");
            return ExitCode::FAILURE;
        }
    };

    let services = match start_services(&config, &runtime).await {
        Ok(services) => services,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(loaders = runtime.active_loaders().len(), "All services started");

    wait_for_termination().await;
    runtime.shutdown();

    for service in &services {
        tracing::info!(
            service = %service.handle.name(),
            version = %service.handle.current_version(),
            document = %service.handle.current_instance(),
            "Final state"
        );
    }
    drop(services);

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
