//! Write-only interaction traces for offline prompt and policy tuning.
//!
//! `emit` never blocks the caller: records go onto an unbounded channel and a
//! background task appends them as JSON lines under `<dir>/<YYYYMMDD>/`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub trace_id: String,
    pub session_id: Option<String>,
    pub component: String,
    pub prompt_context: String,
    pub response: String,
    pub success: bool,
    pub latency_ms: u64,
    pub timestamp: DateTime<Utc>,
}

pub trait TraceSink: Send + Sync {
    fn emit(&self, record: TraceRecord);
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTraceSink;

impl TraceSink for NoopTraceSink {
    fn emit(&self, _record: TraceRecord) {}
}

pub struct JsonlTraceSink {
    tx: mpsc::UnboundedSender<TraceRecord>,
}

impl JsonlTraceSink {
    /// Spawns the writer task; must be called inside a tokio runtime.
    pub fn spawn(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        info!("Trace sink writing to {}", dir.display());
        let (tx, mut rx) = mpsc::unbounded_channel::<TraceRecord>();
        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                if let Err(e) = append_record(&dir, &record).await {
                    error!("Failed to write trace {}: {}", record.trace_id, e);
                }
            }
            debug!("Trace writer stopped");
        });
        Self { tx }
    }
}

impl TraceSink for JsonlTraceSink {
    fn emit(&self, record: TraceRecord) {
        if self.tx.send(record).is_err() {
            warn!("Trace writer is gone; dropping record");
        }
    }
}

async fn append_record(dir: &Path, record: &TraceRecord) -> anyhow::Result<()> {
    let day_dir = dir.join(record.timestamp.format("%Y%m%d").to_string());
    tokio::fs::create_dir_all(&day_dir).await?;
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(day_dir.join("traces.jsonl"))
        .await?;
    file.write_all(&line).await?;
    file.flush().await?;
    Ok(())
}
