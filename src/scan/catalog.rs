//! Read-through facade over the scanner and the snapshot caches.
//!
//! Accessors return (possibly empty) vectors, never errors: an unreadable
//! directory or a malformed file degrades to fewer records, logged for
//! diagnostics. Collaborators (the filesystem watcher, the upload route)
//! call `invalidate` after changing the directory.

use crate::model::{
    batch_from_run_log, solutions_from_run_log, Batch, Solution,
};
use crate::parse::parse_run_log_file;
use crate::scan::cache::SnapshotCache;
use crate::scan::scanner::LogDirScanner;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Emitted whenever the cached view of the log directory changes; an
/// external push layer subscribes and fans these out to clients.
#[derive(Debug, Clone)]
pub enum CatalogEvent {
    Invalidated,
    FileChanged(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub batch_count: Option<usize>,
    pub solution_count: Option<usize>,
    pub batch_snapshot_age_secs: Option<f64>,
    pub solution_snapshot_age_secs: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

pub struct LogCatalog {
    scanner: LogDirScanner,
    batches: SnapshotCache<Batch>,
    solutions: SnapshotCache<Solution>,
    events: broadcast::Sender<CatalogEvent>,
}

impl LogCatalog {
    pub fn new(logs_path: PathBuf, ttl: Duration, seed_sample: bool) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            scanner: LogDirScanner::new(logs_path, seed_sample),
            batches: SnapshotCache::new(ttl),
            solutions: SnapshotCache::new(ttl),
            events,
        }
    }

    pub fn scanner(&self) -> &LogDirScanner {
        &self.scanner
    }

    /// All batches, via the snapshot cache.
    pub async fn batches(&self) -> Arc<Vec<Batch>> {
        let scanner = self.scanner.clone();
        self.batches
            .get_or_refresh(|| scan_batches(scanner))
            .await
    }

    /// All solutions, via the snapshot cache.
    pub async fn solutions(&self) -> Arc<Vec<Solution>> {
        let scanner = self.scanner.clone();
        self.solutions
            .get_or_refresh(|| scan_solutions(scanner))
            .await
    }

    /// Drop both snapshots and notify subscribers.
    pub async fn invalidate(&self) {
        self.batches.invalidate().await;
        self.solutions.invalidate().await;
        let _ = self.events.send(CatalogEvent::Invalidated);
    }

    /// Note a changed file for subscribers. Cache invalidation is separate;
    /// the watcher debounces before calling `invalidate`.
    pub fn notify_file_changed(&self, file_name: String) {
        let _ = self.events.send(CatalogEvent::FileChanged(file_name));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.events.subscribe()
    }

    pub async fn stats(&self) -> CacheStats {
        let batches = self.batches.peek().await;
        let solutions = self.solutions.peek().await;
        CacheStats {
            batch_count: batches.map(|(n, _)| n),
            solution_count: solutions.map(|(n, _)| n),
            batch_snapshot_age_secs: batches.map(|(_, age)| age.as_secs_f64()),
            solution_snapshot_age_secs: solutions.map(|(_, age)| age.as_secs_f64()),
            timestamp: Utc::now(),
        }
    }
}

/// Full directory scan: one bottom-up parse per run log, unparseable files
/// skipped. Falls back to the legacy summary.log when no run logs exist.
async fn scan_batches(scanner: LogDirScanner) -> Vec<Batch> {
    let entries = match scanner.list_run_logs().await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "Directory scan failed, returning empty batch list");
            return Vec::new();
        }
    };

    if entries.is_empty() {
        let legacy = scanner.summary_batches().await;
        if !legacy.is_empty() {
            debug!(count = legacy.len(), "No run logs; using legacy summary.log");
            return legacy;
        }
    }

    let mut batches = Vec::with_capacity(entries.len());
    for entry in &entries {
        let Some(info) = parse_run_log_file(&entry.path(scanner.logs_path())).await else {
            continue;
        };
        batches.push(batch_from_run_log(&entry.a_range, &entry.file_name, &info));
    }
    batches
}

async fn scan_solutions(scanner: LogDirScanner) -> Vec<Solution> {
    let entries = match scanner.list_run_logs().await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "Directory scan failed, returning empty solution list");
            return Vec::new();
        }
    };

    let mut solutions = Vec::new();
    for entry in &entries {
        let Some(info) = parse_run_log_file(&entry.path(scanner.logs_path())).await else {
            continue;
        };
        solutions.extend(solutions_from_run_log(
            &entry.a_range,
            &entry.file_name,
            &info,
        ));
    }
    solutions
}
