//! In-process error sink, for tests and single-process deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::ErrorSink;
use crate::Result;
use crate::tracker::ErrorRecord;

/// In-process error sink. Never fails; contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryErrorSink {
    records: RwLock<Vec<ErrorRecord>>,
}

impl MemoryErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored record, oldest first.
    pub async fn records(&self) -> Vec<ErrorRecord> {
        self.records.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ErrorSink for MemoryErrorSink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn insert(&self, record: &ErrorRecord) -> Result<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn query(&self, since: DateTime<Utc>) -> Result<Vec<ErrorRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.timestamp >= since)
            .cloned()
            .collect())
    }
}
