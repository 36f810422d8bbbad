//! Query-time narrowing and ordering of batch/solution sequences.
//!
//! Applied in a fixed order: predicate filtering, then sorting, then offset
//! skip, then limit cutoff. All filters are AND-combined and optional.
//! Date bounds are inclusive on both ends.

use crate::model::{Batch, Solution};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::cmp::Ordering;
use tracing::debug;

/// When a 1-based `page` is given without an explicit `limit`, this is the
/// page size used for the page-to-offset conversion.
pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterOptions {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub batch_range: Option<String>,
    pub min_cubes_count: Option<u64>,
    pub max_cubes_count: Option<u64>,
    pub a_min: Option<i64>,
    pub a_max: Option<i64>,
    pub b_min: Option<i64>,
    pub b_max: Option<i64>,
    pub c_min: Option<i64>,
    pub c_max: Option<i64>,
    pub d_min: Option<i64>,
    pub d_max: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PageOptions {
    /// Explicit record offset; takes precedence over `page`.
    pub offset: Option<usize>,
    /// 1-based page number, converted to an offset when `offset` is absent.
    pub page: Option<usize>,
    /// Maximum records returned; absent means unbounded.
    pub limit: Option<usize>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl PageOptions {
    /// Offset precedence: explicit `offset` wins; otherwise
    /// `(page - 1) * limit` with the default page size filling in for a
    /// missing limit; otherwise 0.
    pub fn resolved_offset(&self) -> usize {
        if let Some(offset) = self.offset {
            return offset;
        }
        match self.page {
            Some(page) => (page.max(1) - 1) * self.limit.unwrap_or(DEFAULT_PAGE_SIZE),
            None => 0,
        }
    }
}

/// Both timestamp bounds are inclusive: a batch exactly on `date_from` or
/// `date_to` passes.
pub fn batch_matches(batch: &Batch, filter: &FilterOptions) -> bool {
    if let Some(from) = filter.date_from {
        if batch.timestamp < from {
            return false;
        }
    }
    if let Some(to) = filter.date_to {
        if batch.timestamp > to {
            return false;
        }
    }
    if let Some(range) = &filter.batch_range {
        if &batch.parameters.a_range != range {
            return false;
        }
    }
    if let Some(min) = filter.min_cubes_count {
        if batch.parameters.found.unwrap_or(0) < min {
            return false;
        }
    }
    if let Some(max) = filter.max_cubes_count {
        if batch.parameters.found.unwrap_or(0) > max {
            return false;
        }
    }
    true
}

pub fn solution_matches(solution: &Solution, filter: &FilterOptions) -> bool {
    if let Some(from) = filter.date_from {
        if solution.timestamp < from {
            return false;
        }
    }
    if let Some(to) = filter.date_to {
        if solution.timestamp > to {
            return false;
        }
    }
    if let Some(range) = &filter.batch_range {
        if &solution.batch_range != range {
            return false;
        }
    }
    if let Some(min) = filter.min_cubes_count {
        if solution.cubes_count < min {
            return false;
        }
    }
    if let Some(max) = filter.max_cubes_count {
        if solution.cubes_count > max {
            return false;
        }
    }
    in_bounds(solution.a, filter.a_min, filter.a_max)
        && in_bounds(solution.b, filter.b_min, filter.b_max)
        && in_bounds(solution.c, filter.c_min, filter.c_max)
        && in_bounds(solution.d, filter.d_min, filter.d_max)
}

fn in_bounds(value: i64, min: Option<i64>, max: Option<i64>) -> bool {
    if let Some(min) = min {
        if value < min {
            return false;
        }
    }
    if let Some(max) = max {
        if value > max {
            return false;
        }
    }
    true
}

/// Filter, sort, offset and limit a batch list, in that order.
pub fn apply_batches(batches: Vec<Batch>, filter: &FilterOptions, page: &PageOptions) -> Vec<Batch> {
    let mut out: Vec<Batch> = batches
        .into_iter()
        .filter(|b| batch_matches(b, filter))
        .collect();
    if let Some(field) = &page.sort_by {
        sort_batches(&mut out, field, page.sort_order.unwrap_or_default());
    }
    paginate(out, page)
}

/// Filter, sort, offset and limit a solution list, in that order.
pub fn apply_solutions(
    solutions: Vec<Solution>,
    filter: &FilterOptions,
    page: &PageOptions,
) -> Vec<Solution> {
    let mut out: Vec<Solution> = solutions
        .into_iter()
        .filter(|s| solution_matches(s, filter))
        .collect();
    if let Some(field) = &page.sort_by {
        sort_solutions(&mut out, field, page.sort_order.unwrap_or_default());
    }
    paginate(out, page)
}

pub fn paginate<T>(items: Vec<T>, page: &PageOptions) -> Vec<T> {
    let offset = page.resolved_offset();
    let iter = items.into_iter().skip(offset);
    match page.limit {
        Some(limit) => iter.take(limit).collect(),
        None => iter.collect(),
    }
}

/// Sort by a named field. An unknown field leaves the incoming
/// (newest-file-first) order untouched.
pub fn sort_batches(batches: &mut [Batch], field: &str, order: SortOrder) {
    let cmp: fn(&Batch, &Batch) -> Ordering = match field {
        "timestamp" | "startTime" => |x, y| x.timestamp.cmp(&y.timestamp),
        "endTime" => |x, y| x.end_time.cmp(&y.end_time),
        "duration" => |x, y| f64_cmp(x.duration, y.duration),
        "checked" => |x, y| x.parameters.checked.cmp(&y.parameters.checked),
        "found" => |x, y| x.parameters.found.cmp(&y.parameters.found),
        "rps" => |x, y| x.parameters.rps.cmp(&y.parameters.rps),
        "aRange" => |x, y| x.parameters.a_range.cmp(&y.parameters.a_range),
        other => {
            debug!(field = other, "Unknown batch sort field, keeping scan order");
            return;
        }
    };
    sort_with(batches, cmp, order);
}

pub fn sort_solutions(solutions: &mut [Solution], field: &str, order: SortOrder) {
    let cmp: fn(&Solution, &Solution) -> Ordering = match field {
        "timestamp" => |x, y| x.timestamp.cmp(&y.timestamp),
        "a" => |x, y| x.a.cmp(&y.a),
        "b" => |x, y| x.b.cmp(&y.b),
        "c" => |x, y| x.c.cmp(&y.c),
        "d" => |x, y| x.d.cmp(&y.d),
        "cubeValue" => |x, y| x.cube_value.cmp(&y.cube_value),
        "cubesCount" => |x, y| x.cubes_count.cmp(&y.cubes_count),
        "duplicateCount" => |x, y| x.duplicate_count.cmp(&y.duplicate_count),
        "batchRange" => |x, y| x.batch_range.cmp(&y.batch_range),
        other => {
            debug!(field = other, "Unknown solution sort field, keeping scan order");
            return;
        }
    };
    sort_with(solutions, cmp, order);
}

fn sort_with<T>(items: &mut [T], cmp: fn(&T, &T) -> Ordering, order: SortOrder) {
    match order {
        SortOrder::Asc => items.sort_by(cmp),
        SortOrder::Desc => items.sort_by(|x, y| cmp(y, x)),
    }
}

fn f64_cmp(x: f64, y: f64) -> Ordering {
    x.partial_cmp(&y).unwrap_or(Ordering::Equal)
}
