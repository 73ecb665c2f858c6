//! archivist-jobs - Archival job service
//!
//! Runs the HTTP API and a pool of job workers against one SQLite database
//! in the root folder.

use anyhow::{Context, Result};
use archivist_common::config::{resolve_root_folder, RootLayout, TomlConfig};
use archivist_common::events::EventBus;
use archivist_common::i18n::Catalog;
use archivist_jobs::config::JobsConfig;
use archivist_jobs::jobs::{JobRunner, JobWorker};
use archivist_jobs::AppState;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for archivist-jobs
#[derive(Parser, Debug)]
#[command(name = "archivist-jobs")]
#[command(about = "Import, move and reindex jobs for archival descriptions")]
#[command(version)]
struct Args {
    /// Root folder holding the database, uploads and downloads
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Explicit config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:5740
    #[arg(short, long)]
    bind: Option<String>,

    /// Number of job workers
    #[arg(short, long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},tower_http=info", toml.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting archivist-jobs");
    info!("Version: {} ({})", env!("CARGO_PKG_VERSION"), env!("GIT_HASH"));

    let mut config = JobsConfig::from_toml(&toml);
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if let Some(workers) = args.workers {
        config.worker_count = workers.max(1);
    }

    // Step 1: Resolve root folder and create its layout
    let layout = RootLayout::new(resolve_root_folder(args.root_folder.as_deref(), &toml));
    layout
        .ensure_directories()
        .context("Failed to initialize root folder")?;
    info!("Root folder: {}", layout.root().display());

    // Step 2: Open or create database
    let db_path = layout.database_path();
    info!("Database: {}", db_path.display());
    let db = archivist_jobs::db::init_database_pool(&db_path).await?;

    // Step 3: Message catalog, stale job recovery and shared services
    let catalog = Arc::new(
        Catalog::load(&config.culture, &layout.i18n_dir())
            .context("Failed to load message catalog")?,
    );

    let stale = archivist_jobs::db::jobs::fail_stale_jobs(&db, &catalog).await?;
    if stale > 0 {
        warn!("Marked {} interrupted job(s) as failed", stale);
    }

    let event_bus = EventBus::new(256);
    let services =
        archivist_jobs::job_services(db, &layout, Arc::new(toml), catalog, event_bus);

    // Step 4: Job workers
    let cancel = CancellationToken::new();
    let runner = JobRunner::new(services.clone());
    let mut workers = Vec::with_capacity(config.worker_count);
    for id in 0..config.worker_count {
        let worker = JobWorker::new(id, runner.clone(), config.poll_interval);
        workers.push(tokio::spawn(worker.run(cancel.clone())));
    }
    info!("{} job worker(s) started", config.worker_count);

    // Step 5: HTTP server
    let state = AppState::new(&services, layout, config.worker_count);
    let app = archivist_jobs::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_address))?;
    info!("Listening on http://{}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Let running jobs finish before exiting
    cancel.cancel();
    for worker in workers {
        if let Err(e) = worker.await {
            warn!("Job worker ended abnormally: {}", e);
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
