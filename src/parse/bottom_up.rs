//! Bottom-up run-log parsing.
//!
//! A run log is written top-down by the search program, but the interesting
//! data (the terminal line and the solutions section) sits at the end of the
//! file, so parsing walks from the last non-blank line upward. Files that are
//! mid-write or truncated simply have no terminal line yet; they parse to
//! `None` rather than an error.

use crate::parse::grammar::{self, ParamTuple};
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::debug;

/// How many lines above the last non-blank line to probe for the terminal
/// "Found N cubes" / "No cubes found" line before giving up on the file.
const TERMINAL_PROBE_DEPTH: usize = 5;

/// Everything extracted from one run-log file.
///
/// `solutions` is in upward-scan order (reverse of file order); callers must
/// not rely on it matching execution order. A missing completion banner
/// leaves `total_combinations` and `duration_secs` at zero. `throughput` is
/// whatever the log reported; it is never recomputed from
/// `total_combinations / duration_secs` even when the two disagree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunLogInfo {
    pub solution_count: u64,
    pub solutions: Vec<ParamTuple>,
    pub throughput: u64,
    pub total_combinations: u64,
    pub duration_secs: f64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub mode: Option<String>,
    pub threads: Option<u32>,
}

/// Parse the full text of one run-log file.
///
/// Returns `None` for empty files and files where no terminal line is found
/// within the bounded upward probe — the normal outcome for partially
/// written or in-progress logs.
pub fn parse_run_log(text: &str) -> Option<RunLogInfo> {
    let lines: Vec<&str> = text.lines().collect();
    let last = lines.iter().rposition(|l| !l.trim().is_empty())?;

    // Probe the last non-blank line and up to TERMINAL_PROBE_DEPTH lines
    // above it for the terminal line.
    let floor = last.saturating_sub(TERMINAL_PROBE_DEPTH);
    let mut terminal_idx = None;
    let mut solution_count = 0;
    for i in (floor..=last).rev() {
        if let Some(count) = grammar::parse_terminal_line(lines[i]) {
            terminal_idx = Some(i);
            solution_count = count;
            break;
        }
    }
    let terminal_idx = terminal_idx?;

    let mut info = RunLogInfo {
        solution_count,
        ..Default::default()
    };

    // Collect parameter tuples upward until the section marker. Completion
    // banner and throughput lines can interleave with the solutions section,
    // so metadata matchers run here too.
    let mut i = terminal_idx;
    while i > 0 {
        i -= 1;
        let line = lines[i];
        if grammar::is_section_marker(line) {
            break;
        }
        if let Some(tuple) = grammar::parse_param_tuple(line) {
            info.solutions.push(tuple);
        } else if apply_metadata(&mut info, line) {
            return Some(info);
        }
    }

    // Above the solutions section: first match wins per field, scanning
    // terminates at the start banner or the top of the file.
    while i > 0 {
        i -= 1;
        if apply_metadata(&mut info, lines[i]) {
            break;
        }
    }

    Some(info)
}

/// Try each metadata recognizer against a line, filling fields that are
/// still unset. Returns true when the start banner was matched, which ends
/// the upward scan.
fn apply_metadata(info: &mut RunLogInfo, line: &str) -> bool {
    if let Some(start) = grammar::parse_start_banner(line) {
        if info.start_time.is_none() {
            info.start_time = Some(start);
        }
        return true;
    }
    if info.end_time.is_none() {
        if let Some(banner) = grammar::parse_completion_banner(line) {
            info.end_time = Some(banner.end_time);
            info.total_combinations = banner.total_combinations;
            info.duration_secs = banner.duration_secs;
            return false;
        }
    }
    if info.throughput == 0 {
        if let Some(rps) = grammar::parse_throughput(line) {
            info.throughput = rps;
            return false;
        }
    }
    if info.mode.is_none() {
        if let Some(mode) = grammar::parse_mode_line(line) {
            info.mode = Some(mode);
            return false;
        }
    }
    if info.threads.is_none() {
        if let Some(threads) = grammar::parse_threads_line(line) {
            info.threads = Some(threads);
        }
    }
    false
}

/// Read and parse one run-log file. Read failures and unparseable content
/// both yield `None`; the caller skips the file.
pub async fn parse_run_log_file(path: &Path) -> Option<RunLogInfo> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Failed to read run log");
            return None;
        }
    };
    let info = parse_run_log(&text);
    if info.is_none() {
        debug!(path = %path.display(), "Run log has no terminal line, skipping");
    }
    info
}
