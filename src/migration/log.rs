use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::helpers::fs::write_atomic;
use crate::helpers::time::file_timestamp;

/// Outcome of one submitted record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// 1-based position in the payload file
    pub payload_number: usize,
    /// what the record refers to: master party, invoice number or party name
    pub reference: Value,
    pub status_code: Option<u16>,
    pub response: Value,
    pub row_number: Value,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
struct Entries {
    items: Vec<LogEntry>,
    flushed: usize,
}

/// In-memory log of a batch, written as one JSON array to
/// `<dir>/<target>_<timestamp>.json`. The file is rewritten on every flush.
#[derive(Debug, Clone)]
pub struct MigrationLog {
    path: PathBuf,
    entries: Arc<Mutex<Entries>>,
}

/// Background task flushing a `MigrationLog` on an interval
pub struct AutoFlush {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl MigrationLog {
    pub fn new(dir: impl AsRef<Path>, target: &str) -> Self {
        let path = dir.as_ref().join(format!("{}_{}.json", target, file_timestamp()));
        Self { path, entries: Arc::default() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn push(&self, entry: LogEntry) {
        self.entries.lock().await.items.push(entry);
    }

    pub async fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().await.items.clone()
    }

    /// Write every entry when something changed since the last flush
    pub async fn flush(&self) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if entries.flushed == entries.items.len() && self.path.exists() {
            return Ok(());
        }
        let content = serde_json::to_string_pretty(&entries.items)?;
        write_atomic(&self.path, &content).await?;
        entries.flushed = entries.items.len();
        debug!(entries = entries.flushed, "migration log flushed to {}", self.path.display());
        Ok(())
    }

    pub fn start_auto_flush(&self, interval: Duration) -> AutoFlush {
        let (stop, mut stopped) = watch::channel(false);
        let log = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = log.flush().await {
                            warn!("migration log flush failed: {}", e);
                        }
                    }
                    _ = stopped.changed() => break,
                }
            }
        });
        AutoFlush { stop, handle }
    }
}

impl AutoFlush {
    /// Stop the background task and flush whatever is left
    pub async fn stop(self, log: &MigrationLog) -> Result<()> {
        let _ = self.stop.send(true);
        if let Err(e) = self.handle.await {
            warn!("auto flush task ended abnormally: {}", e);
        }
        log.flush().await?;
        info!("migration log written to {}", log.path().display());
        Ok(())
    }
}
