//! Serialization of record streams into chunked response bodies.
//!
//! A [`RecordSink`] is the pacing boundary: its `send` resolves only when
//! the transport has accepted the chunk, so a slow client stalls the
//! generator instead of ballooning memory. Each record is serialized and
//! handed over as a single chunk; a record is either fully written or not
//! written at all.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::pin::pin;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("client disconnected before the stream completed")]
    TransportClosed,
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("record did not serialize to an object")]
    NotAnObject,
}

/// Accepts one response chunk at a time. `send` must not resolve until the
/// transport has taken the chunk.
#[async_trait]
pub trait RecordSink: Send {
    async fn send(&mut self, chunk: String) -> Result<(), StreamError>;
}

/// Sink over a bounded channel. The channel capacity is the whole write
/// buffer; once it fills, `send` waits for the consumer to drain.
pub struct ChannelSink {
    tx: mpsc::Sender<String>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl RecordSink for ChannelSink {
    async fn send(&mut self, chunk: String) -> Result<(), StreamError> {
        self.tx
            .send(chunk)
            .await
            .map_err(|_| StreamError::TransportClosed)
    }
}

/// Write the standard JSON envelope around a record stream:
/// `{"success":true,"data":[...],"count":N,"timestamp":"..."}`.
///
/// The count and timestamp trail the data array so they can be emitted
/// without knowing the record count up front.
pub async fn write_json_stream<S, K>(records: S, sink: &mut K) -> Result<usize, StreamError>
where
    S: Stream,
    S::Item: Serialize,
    K: RecordSink + ?Sized,
{
    let mut records = pin!(records);
    sink.send("{\"success\":true,\"data\":[".to_string()).await?;

    let mut count = 0usize;
    while let Some(record) = records.next().await {
        let json = serde_json::to_string(&record)?;
        let chunk = if count == 0 { json } else { format!(",{json}") };
        sink.send(chunk).await?;
        count += 1;
    }

    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    sink.send(format!("],\"count\":{count},\"timestamp\":\"{timestamp}\"}}"))
        .await?;
    debug!(count, "JSON stream complete");
    Ok(count)
}

/// Write a record stream as CSV, one row chunk per record. The header row
/// is taken from the first record's field names, in declaration order.
/// An empty stream produces an empty body.
pub async fn write_csv_stream<S, K>(records: S, sink: &mut K) -> Result<usize, StreamError>
where
    S: Stream,
    S::Item: Serialize,
    K: RecordSink + ?Sized,
{
    let mut records = pin!(records);
    let mut count = 0usize;
    while let Some(record) = records.next().await {
        let value = serde_json::to_value(&record)?;
        let obj = value.as_object().ok_or(StreamError::NotAnObject)?;
        if count == 0 {
            let header = obj.keys().cloned().collect::<Vec<_>>().join(",");
            sink.send(format!("{header}\n")).await?;
        }
        let row = obj
            .values()
            .map(csv_field)
            .collect::<Vec<_>>()
            .join(",");
        sink.send(format!("{row}\n")).await?;
        count += 1;
    }
    debug!(count, "CSV stream complete");
    Ok(count)
}

/// Comma-containing values are wrapped in double quotes; embedded quotes
/// pass through untouched.
fn csv_field(value: &serde_json::Value) -> String {
    let text = match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    };
    if text.contains(',') || text.contains('\n') {
        format!("\"{text}\"")
    } else {
        text
    }
}
