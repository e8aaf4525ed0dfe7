//! Append-only JSON-lines error log.
//!
//! One [`ErrorRecord`] per line. Intended as the local fallback behind a
//! shared database sink, and as the input of the `muninn` CLI.

use std::io::{ErrorKind as IoErrorKind, SeekFrom};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::warn;

use super::ErrorSink;
use crate::tracker::ErrorRecord;
use crate::{MuninnError, Result};

/// Error sink writing JSON lines to a local file.
///
/// Appends are serialized through a mutex so concurrent inserts never
/// interleave within a line. The parent directory is created on first
/// write.
#[derive(Debug)]
pub struct JsonLinesErrorSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesErrorSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `file` is empty or its last byte is a newline.
    async fn ends_with_newline(&self, file: &mut File) -> std::io::Result<bool> {
        if file.metadata().await?.len() == 0 {
            return Ok(true);
        }
        file.seek(SeekFrom::End(-1)).await?;
        Ok(file.read_u8().await? == b'\n')
    }

    fn persistence_error(&self, action: &str, e: impl std::fmt::Display) -> MuninnError {
        MuninnError::Persistence {
            sink: self.name().to_string(),
            message: format!("failed to {action} {}: {e}", self.path.display()),
        }
    }
}

#[async_trait]
impl ErrorSink for JsonLinesErrorSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn insert(&self, record: &ErrorRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| self.persistence_error("create directory for", e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.persistence_error("open", e))?;
        if !self
            .ends_with_newline(&mut file)
            .await
            .map_err(|e| self.persistence_error("inspect", e))?
        {
            // A torn last line must not swallow this record.
            line.insert(0, '\n');
        }
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| self.persistence_error("append to", e))?;
        file.flush()
            .await
            .map_err(|e| self.persistence_error("flush", e))?;
        Ok(())
    }

    async fn query(&self, since: DateTime<Utc>) -> Result<Vec<ErrorRecord>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.persistence_error("read", e)),
        };

        let mut records = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ErrorRecord>(line) {
                Ok(record) if record.timestamp >= since => records.push(record),
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        line = lineno + 1,
                        error = %e,
                        "skipping corrupt error log line"
                    );
                }
            }
        }
        Ok(records)
    }
}
