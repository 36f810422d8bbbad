//! Lazy record production for streamed responses.
//!
//! Each stream starts a fresh directory scan, parses one file at a time and
//! yields one record at a time; nothing is materialized ahead of the
//! consumer. Dropping the stream (client disconnect) stops further parsing
//! at the next file boundary.
//!
//! Sorting is not available on the streaming path: ordering a lazy sequence
//! would force full materialization. Records arrive in the scanner's
//! newest-file-first order, which is also the materialized default.

use crate::model::{batch_from_run_log, solutions_from_run_log, Batch, Solution};
use crate::parse::parse_run_log_file;
use crate::query::{batch_matches, solution_matches, FilterOptions, PageOptions};
use crate::scan::{LogDirScanner, RunLogEntry};
use futures::Stream;
use std::collections::VecDeque;
use tracing::{debug, warn};

struct GenState {
    scanner: LogDirScanner,
    filter: FilterOptions,
    queue: Option<VecDeque<RunLogEntry>>,
    pending: VecDeque<Solution>,
    to_skip: usize,
    remaining: Option<usize>,
}

impl GenState {
    fn new(scanner: LogDirScanner, filter: FilterOptions, page: &PageOptions) -> Self {
        if page.sort_by.is_some() {
            debug!("Sort is ignored on the streaming path; records arrive in scan order");
        }
        Self {
            scanner,
            filter,
            queue: None,
            pending: VecDeque::new(),
            to_skip: page.resolved_offset(),
            remaining: page.limit,
        }
    }

    /// First poll scans the directory once. A scan failure degrades to an
    /// empty stream, matching the materialized accessors.
    async fn ensure_scanned(&mut self) {
        if self.queue.is_some() {
            return;
        }
        let entries = match self.scanner.list_run_logs().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Directory scan failed, streaming no records");
                Vec::new()
            }
        };
        // A batch-range filter can prune whole files by name before any
        // parsing happens.
        let range = self.filter.batch_range.clone();
        self.queue = Some(
            entries
                .into_iter()
                .filter(|e| range.as_deref().map_or(true, |r| e.a_range == r))
                .collect(),
        );
    }

    fn take_budget(&mut self) -> bool {
        if self.to_skip > 0 {
            self.to_skip -= 1;
            return false;
        }
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        true
    }

    fn exhausted(&self) -> bool {
        self.remaining == Some(0)
    }
}

/// Stream batches, one parsed file per yielded record.
pub fn stream_batches(
    scanner: LogDirScanner,
    filter: FilterOptions,
    page: PageOptions,
) -> impl Stream<Item = Batch> + Send {
    let state = GenState::new(scanner, filter, &page);
    futures::stream::unfold(state, |mut st| async move {
        st.ensure_scanned().await;
        loop {
            if st.exhausted() {
                return None;
            }
            let entry = st.queue.as_mut().unwrap().pop_front()?;
            let path = entry.path(st.scanner.logs_path());
            let Some(info) = parse_run_log_file(&path).await else {
                continue;
            };
            let batch = batch_from_run_log(&entry.a_range, &entry.file_name, &info);
            if !batch_matches(&batch, &st.filter) {
                continue;
            }
            if !st.take_budget() {
                continue;
            }
            return Some((batch, st));
        }
    })
}

/// Stream solutions; a file's tuples drain one at a time before the next
/// file is parsed.
pub fn stream_solutions(
    scanner: LogDirScanner,
    filter: FilterOptions,
    page: PageOptions,
) -> impl Stream<Item = Solution> + Send {
    let state = GenState::new(scanner, filter, &page);
    futures::stream::unfold(state, |mut st| async move {
        st.ensure_scanned().await;
        loop {
            if st.exhausted() {
                return None;
            }
            if let Some(solution) = st.pending.pop_front() {
                if !st.take_budget() {
                    continue;
                }
                return Some((solution, st));
            }
            let entry = st.queue.as_mut().unwrap().pop_front()?;
            let path = entry.path(st.scanner.logs_path());
            let Some(info) = parse_run_log_file(&path).await else {
                continue;
            };
            st.pending = solutions_from_run_log(&entry.a_range, &entry.file_name, &info)
                .into_iter()
                .filter(|s| solution_matches(s, &st.filter))
                .collect();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;

    async fn write_run_log(dir: &std::path::Path, range: &str, tuples: &[(i64, i64, i64, i64)]) {
        let mut text = format!(
            "2025-07-08 14:23:11 Starting search: a∈[{}]\n\
             Mode: parallel\n\
             Threads: 4\n\
             2025-07-08 15:00:00 Search completed. Checked 1000 combinations in 10.0 seconds.\n\
             Throughput: 100 checks/second\n\
             Cubes of primes found:\n",
            range
        );
        for (a, b, c, d) in tuples {
            text.push_str(&format!("({}, {}, {}, {})\n", a, b, c, d));
        }
        text.push_str(&format!("Found {} cubes of primes.\n", tuples.len()));
        tokio::fs::write(dir.join(format!("run_{}.log", range)), text)
            .await
            .unwrap();
        // Distinct mtimes keep the scan order deterministic.
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_streams_all_solutions_in_scan_order() {
        let dir = tempfile::tempdir().unwrap();
        write_run_log(dir.path(), "1-50", &[(1, 2, 3, 4), (5, 7, 11, 13)]).await;
        write_run_log(dir.path(), "51-100", &[(17, 19, 23, 29)]).await;

        let scanner = LogDirScanner::new(dir.path().to_path_buf(), false);
        let solutions: Vec<_> = stream_solutions(
            scanner,
            FilterOptions::default(),
            PageOptions::default(),
        )
        .collect()
        .await;

        assert_eq!(solutions.len(), 3);
        // Newest file first.
        assert_eq!(solutions[0].batch_range, "51-100");
        assert_eq!(solutions[1].batch_range, "1-50");
    }

    #[tokio::test]
    async fn test_limit_stops_early() {
        let dir = tempfile::tempdir().unwrap();
        write_run_log(dir.path(), "1-50", &[(1, 2, 3, 4), (5, 7, 11, 13)]).await;
        write_run_log(dir.path(), "51-100", &[(17, 19, 23, 29)]).await;

        let scanner = LogDirScanner::new(dir.path().to_path_buf(), false);
        let page = PageOptions {
            limit: Some(2),
            ..Default::default()
        };
        let solutions: Vec<_> =
            stream_solutions(scanner, FilterOptions::default(), page).collect().await;
        assert_eq!(solutions.len(), 2);
    }

    #[tokio::test]
    async fn test_batch_range_prunes_files_by_name() {
        let dir = tempfile::tempdir().unwrap();
        write_run_log(dir.path(), "1-50", &[(1, 2, 3, 4)]).await;
        write_run_log(dir.path(), "51-100", &[(17, 19, 23, 29)]).await;

        let scanner = LogDirScanner::new(dir.path().to_path_buf(), false);
        let filter = FilterOptions {
            batch_range: Some("1-50".into()),
            ..Default::default()
        };
        let batches: Vec<_> =
            stream_batches(scanner, filter, PageOptions::default()).collect().await;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].parameters.a_range, "1-50");
    }

    #[tokio::test]
    async fn test_unparseable_files_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_run_log(dir.path(), "1-50", &[(1, 2, 3, 4)]).await;
        tokio::fs::write(dir.path().join("run_51-100.log"), "mid-write\n")
            .await
            .unwrap();

        let scanner = LogDirScanner::new(dir.path().to_path_buf(), false);
        let batches: Vec<_> = stream_batches(
            scanner,
            FilterOptions::default(),
            PageOptions::default(),
        )
        .collect()
        .await;
        assert_eq!(batches.len(), 1);
    }

    #[tokio::test]
    async fn test_offset_skips_across_files() {
        let dir = tempfile::tempdir().unwrap();
        write_run_log(dir.path(), "1-50", &[(1, 2, 3, 4), (5, 7, 11, 13)]).await;
        write_run_log(dir.path(), "51-100", &[(17, 19, 23, 29), (31, 37, 41, 43)]).await;

        let scanner = LogDirScanner::new(dir.path().to_path_buf(), false);
        let page = PageOptions {
            offset: Some(3),
            ..Default::default()
        };
        let solutions: Vec<_> =
            stream_solutions(scanner, FilterOptions::default(), page).collect().await;
        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].batch_range, "1-50");
    }
}
