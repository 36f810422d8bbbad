//! Domain entities served to the dashboard. Field names serialize in
//! camelCase to preserve the wire shape the UI already consumes.

pub mod materialize;

pub use materialize::{batch_from_run_log, batch_from_summary, solutions_from_run_log};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One execution of the external search program over a parameter sub-range.
/// Rebuilt from log text on every cache refresh; never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub status: BatchStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Elapsed seconds as reported by the completion banner; 0 when absent.
    pub duration: f64,
    pub parameters: BatchParameters,
    pub log_file: String,
    pub summary: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Running,
    Completed,
    Failed,
}

/// Per-batch figures lifted from the log. Only the range token is
/// guaranteed; everything else depends on which banner lines were present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchParameters {
    pub a_range: String,
    pub checked: Option<u64>,
    pub found: Option<u64>,
    pub rps: Option<u64>,
    pub mode: Option<String>,
    pub threads: Option<u32>,
}

/// One parameter tuple `(a, b, c, d)` reported by a batch as satisfying the
/// all-27-values-prime predicate, plus derived display fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Solution {
    pub id: String,
    pub batch_id: String,
    pub batch_range: String,
    pub timestamp: DateTime<Utc>,
    pub cubes_count: u64,
    pub a: i64,
    pub b: i64,
    pub c: i64,
    pub d: i64,
    /// Exact a³+b³+c³+d³. Serialized as a decimal string: the value can
    /// exceed both u64 and the 2^53 integer range of UI-side numbers.
    #[serde(with = "i128_string")]
    pub cube_value: i128,
    pub sorted_params: [i64; 4],
    pub duplicate_count: u8,
    pub is_unique: bool,
    pub log_file: String,
    pub line_number: Option<u64>,
    pub raw_line: String,
}

mod i128_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &i128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
