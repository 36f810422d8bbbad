//! Log directory enumeration.
//!
//! A missing directory is "no data yet": it gets created, optionally seeded
//! with one sample run log so the dashboard has something to show, and the
//! scan proceeds. Callers never see a missing-directory error.

use crate::model::{batch_from_summary, Batch};
use crate::parse::grammar::run_file_range;
use crate::parse::parse_summary_line;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};

pub const SUMMARY_LOG: &str = "summary.log";

/// One candidate run-log file found in the directory.
#[derive(Debug, Clone)]
pub struct RunLogEntry {
    pub file_name: String,
    pub a_range: String,
    pub modified: SystemTime,
}

impl RunLogEntry {
    pub fn path(&self, logs_path: &Path) -> PathBuf {
        logs_path.join(&self.file_name)
    }
}

#[derive(Debug, Clone)]
pub struct LogDirScanner {
    logs_path: PathBuf,
    seed_sample: bool,
}

impl LogDirScanner {
    pub fn new(logs_path: PathBuf, seed_sample: bool) -> Self {
        Self {
            logs_path,
            seed_sample,
        }
    }

    pub fn logs_path(&self) -> &Path {
        &self.logs_path
    }

    /// List `run_<token>.log` files, newest modification time first.
    /// Creates (and optionally seeds) the directory when it is missing.
    pub async fn list_run_logs(&self) -> std::io::Result<Vec<RunLogEntry>> {
        self.ensure_dir().await?;

        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.logs_path).await?;
        while let Some(entry) = dir.next_entry().await? {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Some(a_range) = run_file_range(&file_name) else {
                continue;
            };
            let modified = match entry.metadata().await {
                Ok(meta) => meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                Err(e) => {
                    warn!(file = %file_name, error = %e, "Failed to stat run log");
                    continue;
                }
            };
            entries.push(RunLogEntry {
                a_range: a_range.to_string(),
                file_name,
                modified,
            });
        }

        entries.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(entries)
    }

    /// Parse the legacy `summary.log` aggregate into batches. Used as a
    /// fallback when the directory has no run logs; run logs are the
    /// primary source of truth.
    pub async fn summary_batches(&self) -> Vec<Batch> {
        let path = self.logs_path.join(SUMMARY_LOG);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(_) => return Vec::new(),
        };
        text.lines()
            .filter_map(parse_summary_line)
            .map(|record| batch_from_summary(&record))
            .collect()
    }

    async fn ensure_dir(&self) -> std::io::Result<()> {
        if tokio::fs::metadata(&self.logs_path).await.is_ok() {
            return Ok(());
        }
        info!(path = %self.logs_path.display(), "Logs directory does not exist, creating");
        tokio::fs::create_dir_all(&self.logs_path).await?;

        if self.seed_sample {
            let sample_path = self.logs_path.join("run_1-100.log");
            tokio::fs::write(&sample_path, sample_run_log()).await?;
            info!(path = %sample_path.display(), "Seeded sample run log");
        }
        Ok(())
    }
}

/// A complete, well-formed run log dated now, so a fresh install renders
/// one batch with one solution.
fn sample_run_log() -> String {
    let now = Utc::now();
    let date = now.format("%Y-%m-%d");
    let time = now.format("%H:%M:%S");
    format!(
        "{date} {time} Starting search: a∈[1,100], b∈[1,10000], c∈[1,10000], d∈[1,10000]\n\
         Total combinations: 10000000000\n\
         Mode: parallel\n\
         Threads: 12\n\
         \n\
         {date} {time} Search completed. Checked 10000000000 combinations in 105.23 seconds.\n\
         Throughput: 95028984 checks/second\n\
         \n\
         Cubes of primes found:\n\
         (17, 21, 29, 33)\n\
         Found 1 cubes of primes.\n"
    )
}
