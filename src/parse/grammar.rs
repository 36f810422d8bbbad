//! Line-level recognizers for the two log formats produced by the batch
//! search program: the legacy `summary.log` one-line-per-batch format, and
//! the structured sections of a per-run `run_<range>.log` file.
//!
//! All matchers return `Option` and never fail loudly; a line that does not
//! match a recognizer is simply not that kind of line.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

static SUMMARY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2})(?:\s+(\d{2}:\d{2}))?\s+(.*)$").unwrap()
});
static A_RANGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"a_range=(\S+)").unwrap());
static CHECKED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"checked=(\d+)").unwrap());
static FOUND: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"found=(\d+)").unwrap());
static ELAPSED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"elapsed=([\d.]+)s").unwrap());
static RPS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"rps=(\d+)").unwrap());

static PARAM_TUPLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d+),\s*(\d+),\s*(\d+),\s*(\d+)\)").unwrap());
static TERMINAL_FOUND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Found\s+(\d+)\s+cubes\s+of\s+primes").unwrap());
static TERMINAL_NONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)No\s+cubes\s+of\s+primes\s+found").unwrap());
static SECTION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Cubes\s+of\s+primes\s+found:").unwrap());
static START_BANNER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2})\s+(\d{2}:\d{2}(?::\d{2})?)\s+Starting search:").unwrap()
});
static COMPLETION_BANNER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{4}-\d{2}-\d{2})\s+(\d{2}:\d{2}(?::\d{2})?)\s+Search completed\.\s+Checked\s+(\d+)\s+combinations\s+in\s+([\d.]+)\s+seconds\.",
    )
    .unwrap()
});
static THROUGHPUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Throughput:\s+([\d,]+)\s+checks/second").unwrap());
static MODE_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^Mode:\s+(\S+)").unwrap());
static THREADS_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Threads:\s+(\d+)").unwrap());
static RUN_FILE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^run_(.+)\.log$").unwrap());

/// One line of the legacy `summary.log` aggregate:
/// `YYYY-MM-DD[ HH:MM] a_range=<token> checked=<n> found=<n> elapsed=<f>s rps=<n>`.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRecord {
    pub timestamp: DateTime<Utc>,
    pub a_range: String,
    pub checked: Option<u64>,
    pub found: Option<u64>,
    pub elapsed_secs: Option<f64>,
    pub rps: Option<u64>,
}

/// One `(a, b, c, d)` parameter tuple reported as a solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamTuple {
    pub a: i64,
    pub b: i64,
    pub c: i64,
    pub d: i64,
}

/// Parse a summary-log line. The date prefix and the `a_range` field are
/// mandatory; every other `key=value` field is optional. Anything else
/// returns `None`.
pub fn parse_summary_line(line: &str) -> Option<SummaryRecord> {
    let caps = SUMMARY_LINE.captures(line)?;
    let date = caps.get(1).unwrap().as_str();
    let time = caps.get(2).map(|m| m.as_str());
    let rest = caps.get(3).unwrap().as_str();

    let a_range = A_RANGE.captures(rest)?.get(1).unwrap().as_str().to_string();

    Some(SummaryRecord {
        timestamp: parse_timestamp(date, time)?,
        a_range,
        checked: capture_u64(&CHECKED, rest),
        found: capture_u64(&FOUND, rest),
        elapsed_secs: ELAPSED
            .captures(rest)
            .and_then(|c| c.get(1).unwrap().as_str().parse().ok()),
        rps: capture_u64(&RPS, rest),
    })
}

/// Extract a `(a, b, c, d)` tuple from anywhere in a line.
pub fn parse_param_tuple(line: &str) -> Option<ParamTuple> {
    let caps = PARAM_TUPLE.captures(line)?;
    Some(ParamTuple {
        a: caps.get(1).unwrap().as_str().parse().ok()?,
        b: caps.get(2).unwrap().as_str().parse().ok()?,
        c: caps.get(3).unwrap().as_str().parse().ok()?,
        d: caps.get(4).unwrap().as_str().parse().ok()?,
    })
}

/// Match the terminal line of a run log. `Found N cubes of primes.` yields
/// `Some(N)`; `No cubes of primes found in this range.` yields `Some(0)`.
pub fn parse_terminal_line(line: &str) -> Option<u64> {
    if let Some(caps) = TERMINAL_FOUND.captures(line) {
        return caps.get(1).unwrap().as_str().parse().ok();
    }
    if TERMINAL_NONE.is_match(line) {
        return Some(0);
    }
    None
}

/// The `Cubes of primes found:` marker that opens the solutions section.
pub fn is_section_marker(line: &str) -> bool {
    SECTION_MARKER.is_match(line)
}

/// Start banner: `<date> <time> Starting search: ...`. Yields the start
/// timestamp.
pub fn parse_start_banner(line: &str) -> Option<DateTime<Utc>> {
    let caps = START_BANNER.captures(line)?;
    parse_timestamp(caps.get(1).unwrap().as_str(), Some(caps.get(2).unwrap().as_str()))
}

/// Completion banner fields: end timestamp, total combinations checked and
/// elapsed seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionBanner {
    pub end_time: DateTime<Utc>,
    pub total_combinations: u64,
    pub duration_secs: f64,
}

/// Completion banner: `<date> <time> Search completed. Checked <N>
/// combinations in <F> seconds.`
pub fn parse_completion_banner(line: &str) -> Option<CompletionBanner> {
    let caps = COMPLETION_BANNER.captures(line)?;
    Some(CompletionBanner {
        end_time: parse_timestamp(
            caps.get(1).unwrap().as_str(),
            Some(caps.get(2).unwrap().as_str()),
        )?,
        total_combinations: caps.get(3).unwrap().as_str().parse().ok()?,
        duration_secs: caps.get(4).unwrap().as_str().parse().ok()?,
    })
}

/// `Throughput: <N> checks/second`, with thousands separators stripped.
pub fn parse_throughput(line: &str) -> Option<u64> {
    let caps = THROUGHPUT.captures(line)?;
    caps.get(1).unwrap().as_str().replace(',', "").parse().ok()
}

/// `Mode: <word>`
pub fn parse_mode_line(line: &str) -> Option<String> {
    MODE_LINE
        .captures(line)
        .map(|c| c.get(1).unwrap().as_str().to_string())
}

/// `Threads: <n>`
pub fn parse_threads_line(line: &str) -> Option<u32> {
    THREADS_LINE
        .captures(line)
        .and_then(|c| c.get(1).unwrap().as_str().parse().ok())
}

/// Extract the range token from a `run_<token>.log` filename.
pub fn run_file_range(file_name: &str) -> Option<&str> {
    RUN_FILE
        .captures(file_name)
        .map(|c| c.get(1).unwrap().as_str())
}

fn capture_u64(re: &Regex, text: &str) -> Option<u64> {
    re.captures(text)
        .and_then(|c| c.get(1).unwrap().as_str().parse().ok())
}

/// Build a UTC timestamp from the log's naive `YYYY-MM-DD` date and optional
/// `HH:MM[:SS]` time-of-day. A missing time means start of day.
fn parse_timestamp(date: &str, time: Option<&str>) -> Option<DateTime<Utc>> {
    let naive = match time {
        Some(t) => {
            let combined = format!("{} {}", date, t);
            NaiveDateTime::parse_from_str(&combined, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(&combined, "%Y-%m-%d %H:%M"))
                .ok()?
        }
        None => NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .ok()?
            .and_hms_opt(0, 0, 0)?,
    };
    Some(naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_summary_line_full() {
        let line = "2025-07-02 17:09 a_range=5000-5049 checked=50000000000000 found=1 elapsed=8334.30s rps=6000720081";
        let rec = parse_summary_line(line).unwrap();
        assert_eq!(rec.a_range, "5000-5049");
        assert_eq!(rec.checked, Some(50000000000000));
        assert_eq!(rec.found, Some(1));
        assert_eq!(rec.elapsed_secs, Some(8334.30));
        assert_eq!(rec.rps, Some(6000720081));
        assert_eq!(rec.timestamp.hour(), 17);
        assert_eq!(rec.timestamp.minute(), 9);
    }

    #[test]
    fn test_summary_line_date_only() {
        let line = "2025-07-01 a_range=1-50 checked=50000000000000 found=22 elapsed=15450.45s rps=3236151232";
        let rec = parse_summary_line(line).unwrap();
        assert_eq!(rec.a_range, "1-50");
        assert_eq!(rec.timestamp.hour(), 0);
        assert_eq!(rec.timestamp.minute(), 0);
    }

    #[test]
    fn test_summary_line_missing_optional_fields() {
        let rec = parse_summary_line("2025-07-01 a_range=1-50").unwrap();
        assert_eq!(rec.a_range, "1-50");
        assert_eq!(rec.checked, None);
        assert_eq!(rec.found, None);
        assert_eq!(rec.elapsed_secs, None);
        assert_eq!(rec.rps, None);
    }

    #[test]
    fn test_summary_line_requires_a_range() {
        assert!(parse_summary_line("2025-07-01 checked=100 found=2").is_none());
    }

    #[test]
    fn test_summary_line_requires_date_prefix() {
        assert!(parse_summary_line("a_range=1-50 checked=100").is_none());
        assert!(parse_summary_line("not a log line").is_none());
        assert!(parse_summary_line("").is_none());
    }

    #[test]
    fn test_param_tuple() {
        let tuple = parse_param_tuple("(17, 21, 29, 33)").unwrap();
        assert_eq!(
            tuple,
            ParamTuple {
                a: 17,
                b: 21,
                c: 29,
                d: 33
            }
        );
        // Tuple embedded in surrounding text still matches
        assert!(parse_param_tuple("solution candidate (1,2,3,4) confirmed").is_some());
        assert!(parse_param_tuple("(1, 2, 3)").is_none());
    }

    #[test]
    fn test_terminal_lines() {
        assert_eq!(parse_terminal_line("Found 5 cubes of primes."), Some(5));
        assert_eq!(parse_terminal_line("found 12 Cubes Of Primes."), Some(12));
        assert_eq!(
            parse_terminal_line("No cubes of primes found in this range."),
            Some(0)
        );
        assert_eq!(parse_terminal_line("Throughput: 123 checks/second"), None);
    }

    #[test]
    fn test_throughput_strips_commas() {
        assert_eq!(
            parse_throughput("Throughput: 95,028,984 checks/second"),
            Some(95028984)
        );
        assert_eq!(
            parse_throughput("Throughput: 95028984 checks/second"),
            Some(95028984)
        );
    }

    #[test]
    fn test_banners() {
        let start = parse_start_banner(
            "2025-07-08 14:23:11 Starting search: a∈[1,100], b∈[1,10000], c∈[1,10000], d∈[1,10000]",
        )
        .unwrap();
        assert_eq!(start.hour(), 14);

        let completion = parse_completion_banner(
            "2025-07-08 16:45:02 Search completed. Checked 10000000000 combinations in 105.23 seconds.",
        )
        .unwrap();
        assert_eq!(completion.total_combinations, 10000000000);
        assert_eq!(completion.duration_secs, 105.23);
        assert!(completion.end_time > start);
    }

    #[test]
    fn test_mode_and_threads() {
        assert_eq!(parse_mode_line("Mode: parallel").as_deref(), Some("parallel"));
        assert_eq!(parse_threads_line("Threads: 12"), Some(12));
        assert_eq!(parse_mode_line("Threads: 12"), None);
    }

    #[test]
    fn test_run_file_range() {
        assert_eq!(run_file_range("run_1-100.log"), Some("1-100"));
        assert_eq!(run_file_range("run_5000-5049.log"), Some("5000-5049"));
        assert_eq!(run_file_range("summary.log"), None);
        assert_eq!(run_file_range("run_1-100.log.bak"), None);
    }
}
