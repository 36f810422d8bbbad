use crate::config::parse::load_config;
use crate::config::types::Config;
use crate::scan::LogCatalog;
use crate::watch::spawn_watcher;
use crate::web::run_server;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::parse::ConfigError),

    #[error("watcher error: {0}")]
    Watch(#[from] crate::watch::WatchError),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("web server error: {0}")]
    WebServer(String),
}

pub async fn run(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = match config_path {
        Some(path) => {
            info!(config_path = %path.display(), "Loading configuration");
            load_config(&path)?
        }
        None => {
            info!("No config file found, running with defaults");
            Config::default()
        }
    };

    run_service(config).await.map_err(|e| e.into())
}

async fn run_service(config: Config) -> Result<(), RunError> {
    info!(path = %config.logs.path.display(), "Opening log catalog");
    let catalog = Arc::new(LogCatalog::new(
        config.logs.path.clone(),
        config.cache.ttl,
        config.logs.seed_sample,
    ));

    // Prime the caches; this also creates (and optionally seeds) the log
    // directory on a fresh install.
    let batches = catalog.batches().await;
    let solutions = catalog.solutions().await;
    info!(
        batches = batches.len(),
        solutions = solutions.len(),
        "Initial scan complete"
    );
    drop((batches, solutions));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let watcher_handle = if config.watch.enabled {
        Some(spawn_watcher(
            catalog.clone(),
            config.logs.path.clone(),
            config.watch.debounce,
            shutdown_rx.clone(),
        )?)
    } else {
        info!("Filesystem watcher disabled; relying on cache TTL");
        None
    };

    info!("Starting web server on {}", config.web.listen);
    let web_catalog = catalog.clone();
    let web_config = config.web.clone();
    let web_shutdown = shutdown_rx.clone();
    let mut web_handle = tokio::spawn(async move {
        run_server(web_catalog, web_config, web_shutdown)
            .await
            .map_err(|e| RunError::WebServer(e.to_string()))
    });

    info!("Dashboard backend started, press Ctrl+C to shutdown");

    let mut early_error = None;
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
            match web_handle.await {
                Ok(Ok(())) => info!("Web server stopped"),
                Ok(Err(e)) => error!(error = %e, "Web server error during shutdown"),
                Err(e) => error!(error = %e, "Web server task join error"),
            }
        }
        result = &mut web_handle => {
            // The server only returns early on a startup failure (for
            // example, the listen address is taken).
            let _ = shutdown_tx.send(true);
            match result {
                Ok(Ok(())) => info!("Web server stopped"),
                Ok(Err(e)) => early_error = Some(e),
                Err(e) => early_error = Some(RunError::Join(e)),
            }
        }
    }

    if let Some(handle) = watcher_handle {
        match handle.await {
            Ok(()) => info!("Watcher stopped"),
            Err(e) => error!(error = %e, "Watcher task join error"),
        }
    }

    match early_error {
        Some(e) => Err(e),
        None => {
            info!("Shutdown complete");
            Ok(())
        }
    }
}
