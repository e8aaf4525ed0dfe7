//! Persistence sinks for tracked AI errors.
//!
//! Sinks implement [`ErrorSink`] and are composed into a [`SinkChain`]:
//! an ordered list tried front to back where the first success wins. A
//! typical deployment puts the shared database first and a local
//! [`JsonLinesErrorSink`] second, so records survive a database outage.
//!
//! ```text
//!   tracker.track(..)
//!          │
//!          ▼
//!   ┌──────────────┐  Err   ┌──────────────┐  Err
//!   │   sink[0]    │ ─────► │   sink[1]    │ ─────► logged, dropped
//!   └──────┬───────┘        └──────┬───────┘
//!          │ Ok                    │ Ok
//!          ▼                       ▼
//!        done                    done
//! ```

mod jsonl;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::warn;

pub use jsonl::JsonLinesErrorSink;
pub use memory::MemoryErrorSink;

use crate::telemetry;
use crate::tracker::ErrorRecord;
use crate::{MuninnError, Result};

/// Durable destination for [`ErrorRecord`]s.
#[async_trait]
pub trait ErrorSink: Send + Sync {
    /// Sink name for logging and metrics.
    fn name(&self) -> &str;

    /// Persist one record.
    async fn insert(&self, record: &ErrorRecord) -> Result<()>;

    /// All records with `timestamp >= since`, in no particular order.
    async fn query(&self, since: DateTime<Utc>) -> Result<Vec<ErrorRecord>>;
}

/// Ordered list of sinks with first-success-wins semantics.
#[derive(Clone, Default)]
pub struct SinkChain {
    sinks: Vec<Arc<dyn ErrorSink>>,
}

impl SinkChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sink at the lowest priority.
    pub fn push(&mut self, sink: Arc<dyn ErrorSink>) {
        self.sinks.push(sink);
    }

    /// Builder-style [`push()`](Self::push).
    pub fn with(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.push(sink);
        self
    }

    /// Number of sinks in the chain.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether the chain has no sinks.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Sink names in priority order.
    pub fn names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Insert into the first sink that accepts the record.
    ///
    /// Returns the name of that sink, or the last sink's error if all fail.
    pub async fn insert(&self, record: &ErrorRecord) -> Result<&str> {
        let mut last_err = None;
        for sink in &self.sinks {
            match sink.insert(record).await {
                Ok(()) => return Ok(sink.name()),
                Err(e) => {
                    record_failure(sink.as_ref(), "insert", &e);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or(MuninnError::NoSink))
    }

    /// Query the first sink that answers.
    pub async fn query(&self, since: DateTime<Utc>) -> Result<Vec<ErrorRecord>> {
        let mut last_err = None;
        for sink in &self.sinks {
            match sink.query(since).await {
                Ok(records) => return Ok(records),
                Err(e) => {
                    record_failure(sink.as_ref(), "query", &e);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or(MuninnError::NoSink))
    }
}

fn record_failure(sink: &dyn ErrorSink, operation: &'static str, error: &MuninnError) {
    metrics::counter!(telemetry::SINK_FAILURES_TOTAL, "sink" => sink.name().to_owned())
        .increment(1);
    warn!(sink = sink.name(), operation, error = %error, "error sink failed");
}
