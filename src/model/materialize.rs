//! Turns parsed log data into `Batch` and `Solution` entities.

use crate::model::{Batch, BatchParameters, BatchStatus, Solution};
use crate::parse::grammar::{ParamTuple, SummaryRecord};
use crate::parse::RunLogInfo;
use chrono::Utc;
use uuid::Uuid;

/// Build a `Batch` from a bottom-up parsed run log. Identifiers embed the
/// processing time and are not stable across re-parses; batches are
/// read-only snapshots and are never referenced by id across calls.
pub fn batch_from_run_log(a_range: &str, log_file: &str, info: &RunLogInfo) -> Batch {
    // Any file with a terminal line is a finished run. A missing banner
    // still gets timestamps so `completed` always carries both.
    let start_time = info
        .start_time
        .or(info.end_time)
        .unwrap_or_else(Utc::now);
    let end_time = info.end_time.or(info.start_time).unwrap_or(start_time);

    Batch {
        id: format!("batch_{}_{}", a_range, Utc::now().timestamp_millis()),
        timestamp: start_time,
        status: BatchStatus::Completed,
        start_time,
        end_time: Some(end_time),
        duration: info.duration_secs,
        parameters: BatchParameters {
            a_range: a_range.to_string(),
            checked: Some(info.total_combinations),
            found: Some(info.solution_count),
            rps: Some(info.throughput),
            mode: info.mode.clone(),
            threads: info.threads,
        },
        log_file: log_file.to_string(),
        summary: format!(
            "a_range={} checked={} found={} elapsed={}s rps={}",
            a_range, info.total_combinations, info.solution_count, info.duration_secs, info.throughput
        ),
    }
}

/// Build a `Batch` from a legacy summary-log line. The one timestamp the
/// line carries stands in for both start and end.
pub fn batch_from_summary(record: &SummaryRecord) -> Batch {
    Batch {
        id: format!("batch_{}_{}", record.a_range, Utc::now().timestamp_millis()),
        timestamp: record.timestamp,
        status: BatchStatus::Completed,
        start_time: record.timestamp,
        end_time: Some(record.timestamp),
        duration: record.elapsed_secs.unwrap_or(0.0),
        parameters: BatchParameters {
            a_range: record.a_range.clone(),
            checked: record.checked,
            found: record.found,
            rps: record.rps,
            mode: None,
            threads: None,
        },
        log_file: format!("run_{}.log", record.a_range),
        summary: format!(
            "a_range={} checked={} found={} elapsed={}s rps={}",
            record.a_range,
            record.checked.unwrap_or(0),
            record.found.unwrap_or(0),
            record.elapsed_secs.unwrap_or(0.0),
            record.rps.unwrap_or(0)
        ),
    }
}

/// Build `Solution`s for every tuple in a parsed run log. The batch id is
/// the log file stem (`run_<range>`), matching what the UI keys on.
pub fn solutions_from_run_log(a_range: &str, log_file: &str, info: &RunLogInfo) -> Vec<Solution> {
    let batch_id = log_file.trim_end_matches(".log").to_string();
    let timestamp = info
        .end_time
        .or(info.start_time)
        .unwrap_or_else(Utc::now);

    info.solutions
        .iter()
        .map(|tuple| {
            let (sorted_params, duplicate_count) = derive_param_stats(tuple);
            Solution {
                id: format!("solution_{}_{}", batch_id, Uuid::new_v4().simple()),
                batch_id: batch_id.clone(),
                batch_range: a_range.to_string(),
                timestamp,
                cubes_count: info.solution_count,
                a: tuple.a,
                b: tuple.b,
                c: tuple.c,
                d: tuple.d,
                cube_value: cube_sum(tuple),
                sorted_params,
                duplicate_count,
                is_unique: duplicate_count == 0,
                log_file: log_file.to_string(),
                // The bottom-up scan does not track source positions.
                line_number: None,
                raw_line: format!("({}, {}, {}, {})", tuple.a, tuple.b, tuple.c, tuple.d),
            }
        })
        .collect()
}

/// Exact sum of four cubes in 128-bit arithmetic. Holds any parameter up to
/// about 2^41 per component; search ranges stay orders of magnitude below
/// that, while f64 math already loses exactness past 2^17 or so per cube.
fn cube_sum(t: &ParamTuple) -> i128 {
    let cube = |v: i64| {
        let v = v as i128;
        v * v * v
    };
    cube(t.a) + cube(t.b) + cube(t.c) + cube(t.d)
}

fn derive_param_stats(t: &ParamTuple) -> ([i64; 4], u8) {
    let mut sorted = [t.a, t.b, t.c, t.d];
    sorted.sort_unstable();
    let mut distinct = 1u8;
    for i in 1..4 {
        if sorted[i] != sorted[i - 1] {
            distinct += 1;
        }
    }
    (sorted, 4 - distinct)
}
