//! fanpost server binary: load config, open storage, start the worker
//! pool and scheduler, and serve the HTTP API until ctrl-c.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use fanpost_core::scheduler::TickPacer;
use fanpost_core::{queue, scheduler, storage, Config, PostingContext};
use fanpost_server::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "fanpost-server", about = "Multi-destination video publishing service")]
struct Args {
    /// Path to the TOML configuration file. When absent, configuration is
    /// read from environment variables only.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the configured bind port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path).context("failed to load configuration")?,
        None => Config::from_env().context("failed to read configuration from environment")?,
    };
    if let Some(host) = args.host {
        config.server.bind_host = host;
    }
    if let Some(port) = args.port {
        config.server.bind_port = port;
    }

    if let Err(errors) = config.validate() {
        for error in &errors {
            tracing::error!("config: {error}");
        }
        anyhow::bail!("configuration invalid ({} errors)", errors.len());
    }

    let pool = storage::init_db(&config.storage.db_path)
        .await
        .context("failed to initialize database")?;
    tracing::info!(db_path = %config.storage.db_path, "Storage ready");

    let (jobs, receiver) = queue::create_job_queue(config.queue.capacity);
    let ctx = Arc::new(PostingContext::new(pool, &config, jobs));

    let cancel = CancellationToken::new();

    let queue_task = tokio::spawn(queue::run_queue(
        receiver,
        ctx.clone(),
        config.queue.workers,
        cancel.clone(),
    ));

    let pacer = TickPacer::new(
        Duration::from_secs(config.scheduler.tick_seconds),
        Duration::from_secs(config.scheduler.jitter_seconds),
    );
    let scheduler_task = tokio::spawn(scheduler::run_scheduler(
        ctx.clone(),
        pacer,
        cancel.clone(),
    ));

    let state = Arc::new(AppState {
        ctx,
        identity_secret: config.server.identity_secret.clone(),
    });
    let router = fanpost_server::build_router(state, &config.server.allowed_origins);

    let addr = format!("{}:{}", config.server.bind_host, config.server.bind_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(addr = %addr, "fanpost server listening");

    let shutdown_cancel = cancel.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
            shutdown_cancel.cancel();
        })
        .await
        .context("server error")?;

    // Let the worker pool drain accepted jobs before exiting.
    cancel.cancel();
    let _ = queue_task.await;
    let _ = scheduler_task.await;

    tracing::info!("fanpost server stopped");
    Ok(())
}
