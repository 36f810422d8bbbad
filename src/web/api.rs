//! HTTP handlers.
//!
//! List endpoints materialize through the catalog's snapshot cache and
//! support filter/sort/offset/limit. The /stream and /export variants
//! bypass the cache: they re-scan lazily and write chunk-by-chunk through a
//! bounded channel, so a slow client throttles parsing instead of buffering
//! the whole result.

use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::query::{apply_batches, apply_solutions, FilterOptions, PageOptions, SortOrder};
use crate::scan::LogCatalog;
use crate::stream::{write_csv_stream, write_json_stream, ChannelSink};

/// Chunks buffered between the generator and the client. Past this, the
/// generator blocks until the client drains.
const STREAM_BUFFER_CHUNKS: usize = 16;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<LogCatalog>,
}

#[derive(Debug, Error)]
pub enum WebError {
    #[error("invalid filename: {0}")]
    InvalidFilename(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebError::InvalidFilename(_) => StatusCode::BAD_REQUEST,
            WebError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
            "timestamp": now_iso(),
        }));
        (status, body).into_response()
    }
}

/// One flat struct for every list/stream endpoint's query string. Split
/// into filter and page options before use.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListQuery {
    date_from: Option<String>,
    date_to: Option<String>,
    batch_range: Option<String>,
    min_cubes_count: Option<u64>,
    max_cubes_count: Option<u64>,
    a_min: Option<i64>,
    a_max: Option<i64>,
    b_min: Option<i64>,
    b_max: Option<i64>,
    c_min: Option<i64>,
    c_max: Option<i64>,
    d_min: Option<i64>,
    d_max: Option<i64>,
    offset: Option<usize>,
    page: Option<usize>,
    limit: Option<usize>,
    sort_by: Option<String>,
    sort_order: Option<SortOrder>,
}

impl ListQuery {
    fn into_parts(self) -> (FilterOptions, PageOptions) {
        let filter = FilterOptions {
            date_from: self.date_from.as_deref().and_then(parse_query_date),
            date_to: self.date_to.as_deref().and_then(parse_query_date),
            batch_range: self.batch_range,
            min_cubes_count: self.min_cubes_count,
            max_cubes_count: self.max_cubes_count,
            a_min: self.a_min,
            a_max: self.a_max,
            b_min: self.b_min,
            b_max: self.b_max,
            c_min: self.c_min,
            c_max: self.c_max,
            d_min: self.d_min,
            d_max: self.d_max,
        };
        let page = PageOptions {
            offset: self.offset,
            page: self.page,
            limit: self.limit,
            sort_by: self.sort_by,
            sort_order: self.sort_order,
        };
        (filter, page)
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, or a bare date (start of day).
fn parse_query_date(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| n.and_utc())
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Serialize)]
struct Envelope<T: Serialize> {
    success: bool,
    data: Vec<T>,
    count: usize,
    timestamp: String,
}

fn envelope<T: Serialize>(data: Vec<T>) -> Json<Envelope<T>> {
    let count = data.len();
    Json(Envelope {
        success: true,
        data,
        count,
        timestamp: now_iso(),
    })
}

pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok", "timestamp": now_iso() }))
}

pub async fn list_batches(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let (filter, page) = query.into_parts();
    let batches = (*state.catalog.batches().await).clone();
    envelope(apply_batches(batches, &filter, &page))
}

pub async fn list_solutions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let (filter, page) = query.into_parts();
    let solutions = (*state.catalog.solutions().await).clone();
    envelope(apply_solutions(solutions, &filter, &page))
}

/// Adapts a chunk channel into a response body; the sender side observes
/// client disconnect as a closed channel.
fn chunked_body(rx: mpsc::Receiver<String>) -> Body {
    Body::from_stream(futures::stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|chunk| (Ok::<_, Infallible>(Bytes::from(chunk)), rx))
    }))
}

pub async fn stream_batches(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let (filter, page) = query.into_parts();
    let scanner = state.catalog.scanner().clone();
    let (mut sink, rx) = ChannelSink::new(STREAM_BUFFER_CHUNKS);
    tokio::spawn(async move {
        let records = crate::stream::stream_batches(scanner, filter, page);
        if let Err(e) = write_json_stream(records, &mut sink).await {
            debug!(error = %e, "Batch stream ended early");
        }
    });
    (
        [(header::CONTENT_TYPE, "application/json")],
        chunked_body(rx),
    )
}

pub async fn stream_solutions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let (filter, page) = query.into_parts();
    let scanner = state.catalog.scanner().clone();
    let (mut sink, rx) = ChannelSink::new(STREAM_BUFFER_CHUNKS);
    tokio::spawn(async move {
        let records = crate::stream::stream_solutions(scanner, filter, page);
        if let Err(e) = write_json_stream(records, &mut sink).await {
            debug!(error = %e, "Solution stream ended early");
        }
    });
    (
        [(header::CONTENT_TYPE, "application/json")],
        chunked_body(rx),
    )
}

pub async fn export_solutions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let (filter, page) = query.into_parts();
    let scanner = state.catalog.scanner().clone();
    let (mut sink, rx) = ChannelSink::new(STREAM_BUFFER_CHUNKS);
    tokio::spawn(async move {
        let records = crate::stream::stream_solutions(scanner, filter, page);
        if let Err(e) = write_csv_stream(records, &mut sink).await {
            debug!(error = %e, "CSV export ended early");
        }
    });
    let filename = format!(
        "cube_solutions_{}.csv",
        Utc::now().format("%Y%m%d_%H%M%S")
    );
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        chunked_body(rx),
    )
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    filename: String,
}

/// Accept a raw log file body and place it in the log directory. The caches
/// are invalidated so the next read sees it immediately.
pub async fn upload_log(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    body: String,
) -> Result<impl IntoResponse, WebError> {
    validate_log_filename(&query.filename)?;

    let path = state.catalog.scanner().logs_path().join(&query.filename);
    tokio::fs::write(&path, body).await?;
    state.catalog.invalidate().await;
    info!(file = %query.filename, "Log file uploaded");

    Ok(Json(json!({
        "success": true,
        "filename": query.filename,
        "message": "log file uploaded",
        "timestamp": now_iso(),
    })))
}

/// Bare `.log` file names only; anything that could escape the log
/// directory is rejected.
fn validate_log_filename(name: &str) -> Result<(), WebError> {
    if name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.starts_with('.')
    {
        return Err(WebError::InvalidFilename(format!(
            "'{name}' must be a bare file name"
        )));
    }
    if !name.ends_with(".log") {
        return Err(WebError::InvalidFilename(format!(
            "'{name}' must end with .log"
        )));
    }
    Ok(())
}

pub async fn cache_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "success": true,
        "data": state.catalog.stats().await,
        "timestamp": now_iso(),
    }))
}

pub async fn cache_clear(State(state): State<AppState>) -> impl IntoResponse {
    state.catalog.invalidate().await;
    info!("Caches cleared by request");
    Json(json!({
        "success": true,
        "message": "caches cleared",
        "timestamp": now_iso(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn state_with_logs(dir: &tempfile::TempDir) -> AppState {
        AppState {
            catalog: Arc::new(LogCatalog::new(
                dir.path().to_path_buf(),
                Duration::from_secs(30),
                false,
            )),
        }
    }

    async fn seed_run_log(dir: &std::path::Path, range: &str) {
        let text = format!(
            "2025-07-08 14:23:11 Starting search: a∈[{range}]\n\
             Mode: parallel\n\
             Threads: 4\n\
             2025-07-08 15:00:00 Search completed. Checked 1000 combinations in 10.0 seconds.\n\
             Throughput: 100 checks/second\n\
             Cubes of primes found:\n\
             (1, 2, 3, 4)\n\
             Found 1 cubes of primes.\n"
        );
        tokio::fs::write(dir.join(format!("run_{range}.log")), text)
            .await
            .unwrap();
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_parse_query_date_forms() {
        assert!(parse_query_date("2025-07-08").is_some());
        assert!(parse_query_date("2025-07-08 14:23:11").is_some());
        assert!(parse_query_date("2025-07-08T14:23:11Z").is_some());
        assert!(parse_query_date("July 8th").is_none());
    }

    #[test]
    fn test_validate_log_filename() {
        assert!(validate_log_filename("run_1-50.log").is_ok());
        assert!(validate_log_filename("../escape.log").is_err());
        assert!(validate_log_filename("a/b.log").is_err());
        assert!(validate_log_filename(".hidden.log").is_err());
        assert!(validate_log_filename("notes.txt").is_err());
        assert!(validate_log_filename("").is_err());
    }

    #[tokio::test]
    async fn test_list_batches_envelope() {
        let dir = tempfile::tempdir().unwrap();
        seed_run_log(dir.path(), "1-50").await;
        let state = state_with_logs(&dir).await;

        let response = list_batches(State(state), Query(ListQuery::default()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["count"], 1);
        assert_eq!(json["data"][0]["parameters"]["aRange"], "1-50");
    }

    #[tokio::test]
    async fn test_stream_solutions_is_valid_envelope() {
        let dir = tempfile::tempdir().unwrap();
        seed_run_log(dir.path(), "1-50").await;
        let state = state_with_logs(&dir).await;

        let response = stream_solutions(State(state), Query(ListQuery::default()))
            .await
            .into_response();
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["count"], 1);
        assert_eq!(json["data"][0]["a"], 1);
    }

    #[tokio::test]
    async fn test_export_headers_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        seed_run_log(dir.path(), "1-50").await;
        let state = state_with_logs(&dir).await;

        let response = export_solutions(State(state), Query(ListQuery::default()))
            .await
            .into_response();
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.starts_with("attachment; filename=\"cube_solutions_"));

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        let mut lines = body.lines();
        let header_line = lines.next().unwrap();
        assert!(header_line.starts_with("id,batchId,batchRange"));
        assert_eq!(lines.count(), 1);
    }

    #[tokio::test]
    async fn test_upload_then_visible() {
        let dir = tempfile::tempdir().unwrap();
        seed_run_log(dir.path(), "1-50").await;
        let state = state_with_logs(&dir).await;
        assert_eq!(
            body_json(
                list_batches(State(state.clone()), Query(ListQuery::default()))
                    .await
                    .into_response()
            )
            .await["count"],
            1
        );

        let log_text = tokio::fs::read_to_string(dir.path().join("run_1-50.log"))
            .await
            .unwrap()
            .replace("1-50", "51-100");
        upload_log(
            State(state.clone()),
            Query(UploadQuery {
                filename: "run_51-100.log".into(),
            }),
            log_text,
        )
        .await
        .unwrap();

        let json = body_json(
            list_batches(State(state), Query(ListQuery::default()))
                .await
                .into_response(),
        )
        .await;
        assert_eq!(json["count"], 2);
    }

    #[tokio::test]
    async fn test_upload_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with_logs(&dir).await;
        let result = upload_log(
            State(state),
            Query(UploadQuery {
                filename: "../evil.log".into(),
            }),
            String::new(),
        )
        .await;
        assert!(matches!(result, Err(WebError::InvalidFilename(_))));
    }

    #[tokio::test]
    async fn test_cache_endpoints() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with_logs(&dir).await;

        state.catalog.batches().await;
        let stats = body_json(cache_stats(State(state.clone())).await.into_response()).await;
        assert_eq!(stats["data"]["batchCount"], 0);

        cache_clear(State(state.clone())).await;
        let stats = body_json(cache_stats(State(state)).await.into_response()).await;
        assert!(stats["data"]["batchCount"].is_null());
    }
}
