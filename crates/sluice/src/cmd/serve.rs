//! Serve command - Run the ingestion pipeline
//!
//! Opens the journal, starts the pipeline loops and the configured sources,
//! and runs until SIGINT or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use sluice_config::Config;
use sluice_metrics::{SourceMetricsProvider, UnifiedReporter};
use sluice_pipeline::Pipeline;
use sluice_sources::GelfUdpSource;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// How long a source may take to stop after cancellation
const SOURCE_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Serve command arguments
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to configuration file (defaults to configs/sluice.toml if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Run the serve command
pub async fn run(args: ServeArgs) -> Result<()> {
    let config_path = args
        .config
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(default)".to_string());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        platform = std::env::consts::OS,
        arch = std::env::consts::ARCH,
        config = %config_path,
        "Sluice starting"
    );

    let config = load_config(args.config)?;

    if let Err(e) = run_server(config).await {
        error!(error = %e, "server error");
        return Err(e);
    }

    info!("Sluice shutdown complete");
    Ok(())
}

/// Load the config file, or fall back to defaults when none is given
pub fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => {
            // Explicit path must exist
            if !path.exists() {
                anyhow::bail!("config file not found: {}", path.display());
            }
            Config::from_file(&path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))
        }
        None => {
            for path in [
                PathBuf::from("configs/sluice.toml"),
                PathBuf::from("sluice.toml"),
            ] {
                if path.exists() {
                    info!(config = %path.display(), "using config file");
                    return Config::from_file(&path).context("failed to load configuration");
                }
            }

            info!("no config file found, using defaults (no sources, stdout sink)");
            Ok(Config::default())
        }
    }
}

/// Main server run loop
async fn run_server(config: Config) -> Result<()> {
    let cancel = CancellationToken::new();

    let pipeline = Pipeline::new(&config).context("failed to build pipeline")?;

    // Sources
    let mut source_tasks: Vec<JoinHandle<()>> = Vec::new();
    let mut source_metrics: Vec<Arc<dyn SourceMetricsProvider>> = Vec::new();

    if config.udp_enabled()
        && let Some(udp_config) = config.sources.udp.clone()
    {
        let source = GelfUdpSource::new(udp_config, pipeline.ingestor());
        source_metrics.push(Arc::new(source.metrics_handle()));

        let source_cancel = cancel.clone();
        let shutdown = cancel.clone();
        source_tasks.push(tokio::spawn(async move {
            if let Err(e) = source.run(source_cancel).await {
                error!(error = %e, "UDP source failed");
                // Without its only listener the pipeline has nothing to do
                shutdown.cancel();
            }
        }));
    } else {
        warn!("no sources enabled; the pipeline will only replay the journal");
    }

    let reporter = UnifiedReporter::builder()
        .config(config.metrics.clone())
        .pipeline(Arc::new(pipeline.pipeline_metrics()))
        .journal(Arc::new(pipeline.journal_metrics()))
        .buffer(Arc::new(pipeline.process_buffer_metrics()))
        .buffer(Arc::new(pipeline.output_buffer_metrics()))
        .assembler(Arc::new(pipeline.assembler_metrics()))
        .dispatcher(Arc::new(pipeline.dispatcher_metrics()))
        .sources(source_metrics)
        .build();
    let metrics_task = tokio::spawn(reporter.run(cancel.clone()));

    let source_count = source_tasks.len();
    let tasks = pipeline.spawn(cancel.clone());

    info!(
        source_count,
        pipeline_tasks = tasks.len(),
        metrics_enabled = config.metrics.enabled,
        sink = config.sink.type_name(),
        "Sluice running"
    );

    tokio::select! {
        _ = wait_for_shutdown() => {
            info!("shutdown signal received, stopping...");
        }
        _ = cancel.cancelled() => {
            warn!("stopping after a component failure");
        }
    }
    cancel.cancel();

    // Sources first so nothing is appended while the pipeline drains
    info!("waiting for sources to stop...");
    for task in source_tasks {
        match tokio::time::timeout(SOURCE_SHUTDOWN_TIMEOUT, task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "source task panicked during shutdown"),
            Err(_) => warn!("source task did not finish within timeout, continuing shutdown"),
        }
    }

    info!("waiting for pipeline to drain...");
    let joined = tasks.join().await;

    if let Err(e) = metrics_task.await {
        warn!(error = %e, "metrics reporter panicked");
    }

    joined.context("pipeline did not shut down cleanly")
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
