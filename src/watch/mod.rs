//! Filesystem watcher that invalidates the catalog when run logs change.
//!
//! Notify callbacks run on the watcher's own thread; changed file names
//! cross into the async world over a bounded channel. Events are debounced
//! so a burst of writes to the same file costs one invalidation.

use crate::scan::LogCatalog;
use notify::{recommended_watcher, Event, EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to start filesystem watcher on {path}: {source}")]
    Start {
        path: PathBuf,
        source: notify::Error,
    },
}

fn is_log_file(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "log")
}

/// Watch `logs_path` (non-recursively) and invalidate `catalog` after each
/// debounced burst of `.log` changes. The watcher lives until `shutdown`
/// fires or the notify thread goes away.
pub fn spawn_watcher(
    catalog: Arc<LogCatalog>,
    logs_path: PathBuf,
    debounce: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Result<JoinHandle<()>, WatchError> {
    let (tx, mut rx) = mpsc::channel::<String>(256);

    let mut watcher = recommended_watcher(move |res: notify::Result<Event>| {
        let event = match res {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Filesystem watcher error");
                return;
            }
        };
        if !matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) {
            return;
        }
        for path in &event.paths {
            if !is_log_file(path) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                // Callback runs outside the runtime, so blocking_send is
                // the right bridge. A full channel drops the event; the
                // TTL refresh covers anything missed.
                let _ = tx.blocking_send(name.to_string());
            }
        }
    })
    .map_err(|source| WatchError::Start {
        path: logs_path.clone(),
        source,
    })?;

    watcher
        .watch(&logs_path, RecursiveMode::NonRecursive)
        .map_err(|source| WatchError::Start {
            path: logs_path.clone(),
            source,
        })?;
    info!(path = %logs_path.display(), "Watching log directory");

    let handle = tokio::spawn(async move {
        // Dropping the watcher stops the notify thread.
        let _watcher = watcher;
        loop {
            tokio::select! {
                changed = rx.recv() => {
                    let Some(name) = changed else { break };
                    catalog.notify_file_changed(name.clone());
                    debug!(file = %name, "Log file changed, debouncing");
                    tokio::time::sleep(debounce).await;
                    while let Ok(more) = rx.try_recv() {
                        catalog.notify_file_changed(more);
                    }
                    catalog.invalidate().await;
                    info!("Log directory changed, caches invalidated");
                }
                _ = shutdown.changed() => break,
            }
        }
        debug!("Filesystem watcher stopped");
    });
    Ok(handle)
}
