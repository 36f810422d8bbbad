use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::config::WebConfig;
use crate::scan::LogCatalog;

use super::api::{
    cache_clear, cache_stats, export_solutions, health_check, list_batches, list_solutions,
    stream_batches, stream_solutions, upload_log, AppState,
};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/batches", get(list_batches))
        .route("/api/batches/stream", get(stream_batches))
        .route("/api/solutions", get(list_solutions))
        .route("/api/solutions/stream", get(stream_solutions))
        .route("/api/solutions/export", get(export_solutions))
        .route("/api/upload", post(upload_log))
        .route("/api/cache", get(cache_stats).delete(cache_clear))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the web server over the given catalog and configuration.
pub async fn run_server(
    catalog: Arc<LogCatalog>,
    web_config: WebConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(AppState { catalog });

    let listener = tokio::net::TcpListener::bind(&web_config.listen).await?;
    tracing::info!("Web server listening on {}", web_config.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.wait_for(|&v| v).await;
            tracing::info!("Web server shutting down gracefully");
        })
        .await?;

    Ok(())
}
