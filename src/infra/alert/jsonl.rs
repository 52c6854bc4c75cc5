//! File-backed alert sink.
//!
//! Escalations are appended to `<dir>/<stream>.jsonl`, one JSON object per
//! line, so an operator console (or `tail -f`) can pick them up. Existing
//! lines are loaded on open. With `tokio-runtime` the file write runs on the
//! blocking pool; appends are serialized by a writer lock that is never held
//! across an await.

use std::fs::{create_dir_all, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::core::error::DispatchError;
use crate::core::ports::{AdminAlertSink, AlertContext};

/// Append-only JSON-lines alert log.
pub struct JsonlAlertSink {
    path: PathBuf,
    writer: Arc<Mutex<()>>,
    alerts: Mutex<Vec<AlertContext>>,
}

impl JsonlAlertSink {
    /// Open (or create) the alert log for `stream` under `dir`.
    pub fn open(dir: impl AsRef<Path>, stream: &str) -> Result<Self, DispatchError> {
        let dir = dir.as_ref();
        create_dir_all(dir).map_err(|e| DispatchError::Backend(e.to_string()))?;
        let sink = Self {
            path: dir.join(format!("{stream}.jsonl")),
            writer: Arc::new(Mutex::new(())),
            alerts: Mutex::new(Vec::new()),
        };
        let loaded = sink.load_from_disk()?;
        debug!("loaded {} alerts from {}", loaded.len(), sink.path.display());
        *sink.alerts.lock() = loaded;
        Ok(sink)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Alerts recorded, including those loaded on open.
    pub fn alerts(&self) -> Vec<AlertContext> {
        self.alerts.lock().clone()
    }

    fn load_from_disk(&self) -> Result<Vec<AlertContext>, DispatchError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = OpenOptions::new()
            .read(true)
            .open(&self.path)
            .map_err(|e| DispatchError::Backend(e.to_string()))?;
        let mut alerts = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| DispatchError::Backend(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            let alert: AlertContext =
                serde_json::from_str(&line).map_err(|e| DispatchError::Backend(e.to_string()))?;
            alerts.push(alert);
        }
        Ok(alerts)
    }
}

fn append_line(writer: &Mutex<()>, path: &Path, line: &str) -> Result<(), DispatchError> {
    let _guard = writer.lock();
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| DispatchError::Backend(e.to_string()))?;
    writeln!(file, "{line}").map_err(|e| DispatchError::Backend(e.to_string()))
}

#[async_trait]
impl AdminAlertSink for JsonlAlertSink {
    async fn notify(&self, alert: &AlertContext) -> Result<(), DispatchError> {
        let line = serde_json::to_string(alert).map_err(|e| DispatchError::Backend(e.to_string()))?;

        #[cfg(feature = "tokio-runtime")]
        {
            let writer = Arc::clone(&self.writer);
            let path = self.path.clone();
            tokio::task::spawn_blocking(move || append_line(&writer, &path, &line))
                .await
                .map_err(|e| DispatchError::Backend(e.to_string()))??;
        }
        #[cfg(not(feature = "tokio-runtime"))]
        append_line(&self.writer, &self.path, &line)?;

        self.alerts.lock().push(alert.clone());
        Ok(())
    }
}
