//! DriveMirror Daemon - Scheduled Drive to S3 mirroring service
//!
//! This binary runs as a long-lived service and handles:
//! - Cron-scheduled sync and health-check jobs
//! - The HTTP status and trigger API
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! All jobs go through a single `JobRunner`, which executes one job at a
//! time. The scheduler and the API only submit work to it. A shared
//! `CancellationToken` stops the scheduler, the API listener and any
//! running job when a shutdown signal arrives.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use drivemirror_api::{ApiServer, ApiState};
use drivemirror_core::config::{Config, LoggingConfig};
use drivemirror_rclone::RcloneTool;
use drivemirror_sync::{jobs::JobRunner, orchestrator::SyncOrchestrator, scheduler::JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for drivemirrord
#[derive(Parser, Debug)]
#[command(name = "drivemirrord", version, about = "DriveMirror sync daemon")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

// ============================================================================
// DaemonService
// ============================================================================

/// Wires the configuration, job runner, scheduler and API together
struct DaemonService {
    config: Arc<Config>,
    runner: JobRunner,
    scheduler: JobScheduler,
    /// Bound listener, present when the API is enabled
    api: Option<ApiServer>,
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Builds every component from `config`.
    ///
    /// Invalid configuration, including malformed cron expressions, is
    /// fatal here so nothing is ever scheduled from a bad setup.
    async fn new(config: Config, shutdown: CancellationToken) -> Result<Self> {
        let errors = config.validate();
        if !errors.is_empty() {
            for e in &errors {
                error!(field = %e.field, "{}", e.message);
            }
            anyhow::bail!("Invalid configuration: {} error(s)", errors.len());
        }

        let config = Arc::new(config);
        let tool = Arc::new(RcloneTool::new(Arc::clone(&config)));
        let orchestrator = Arc::new(
            SyncOrchestrator::new(Arc::clone(&config), tool)
                .context("Failed to create sync orchestrator")?,
        );

        let runner =
            JobRunner::with_shutdown(orchestrator, config.jobs.clone(), shutdown.clone());
        let scheduler = JobScheduler::new(runner.clone(), &config, shutdown.clone())
            .context("Invalid job schedule")?;

        let api = if config.api.enabled {
            let state = ApiState::new(runner.clone(), Arc::clone(&config))
                .context("Failed to create API state")?;
            let server = ApiServer::bind(Arc::new(state), &config.api.bind)
                .await
                .with_context(|| format!("Failed to bind API on {}", config.api.bind))?;
            Some(server)
        } else {
            info!("API disabled by configuration");
            None
        };

        Ok(Self {
            config,
            runner,
            scheduler,
            api,
            shutdown,
        })
    }

    /// Runs until the shutdown token is cancelled
    async fn run(self) -> Result<()> {
        info!(
            source = %self.runner.orchestrator().source(),
            destination = %self.runner.orchestrator().destination(),
            schedule = %self.scheduler.sync_schedule(),
            "DriveMirror daemon ready"
        );

        // Writing the tool profile early surfaces missing credentials at
        // startup; jobs retry setup themselves.
        if let Err(e) = self.runner.orchestrator().setup().await {
            warn!(error = %e, "Mirror tool is not ready yet");
        }

        let api_handle = self.api.map(|server| {
            let token = self.shutdown.clone();
            tokio::spawn(async move { server.run(token).await })
        });

        self.scheduler.run().await;

        if let Some(handle) = api_handle {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "API server failed"),
                Err(e) => error!(error = %e, "API server task panicked"),
            }
        }

        let stats = self.runner.stats();
        info!(
            bind = %self.config.api.bind,
            finished = stats.finished,
            running = stats.running,
            "Daemon stopped"
        );
        Ok(())
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

/// Installs the global subscriber; `RUST_LOG` overrides the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = args.config.unwrap_or_else(Config::default_path);
    let config = Config::resolve(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    init_tracing(&config.logging);
    info!(config_path = %config_path.display(), "DriveMirror daemon starting (drivemirrord)");

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token.clone()).await?;
    let result = service.run().await;

    match &result {
        Ok(()) => info!("DriveMirror daemon shut down gracefully"),
        Err(e) => error!(error = %e, "DriveMirror daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
