//! AI error tracking and threshold alerting.
//!
//! [`ErrorTracker::track()`] turns a raw [`AiFailure`] into a classified,
//! persisted, alertable event:
//!
//! 1. [`classify()`] sorts the failure into an [`ErrorKind`].
//! 2. The kind's in-memory counter is bumped. Reaching the kind's
//!    threshold resets it to zero and marks an alert as due, in one atomic
//!    step, so concurrent trackers never double-fire or miss a crossing.
//! 3. An [`ErrorRecord`] is written through the [`SinkChain`]. Persistence
//!    is best effort: failures are logged, never returned.
//! 4. A due [`Alert`] is raised on every [`AlertChannel`].
//!
//! Counters are process-local; a restart silently resets alerting state.
//!
//! ```text
//!   Below ──track (count+1 < threshold)──► Below
//!   Below ──track (count+1 = threshold)──► alert, count = 0
//! ```

mod classify;
mod record;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

pub use classify::{AiFailure, ErrorKind, classify};
pub use record::{DEFAULT_INPUT_PREVIEW_LIMIT, ErrorRecord};

use crate::alert::{Alert, AlertChannel, LogAlertChannel};
use crate::sink::{ErrorSink, SinkChain};
use crate::telemetry;

/// Per-kind alert thresholds.
///
/// Kinds signalling hard service failure (quota, missing model) alert
/// sooner than noisy ones. A threshold of 0 behaves like 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub rate_limited: u32,
    pub quota_exceeded: u32,
    pub model_unavailable: u32,
    pub invalid_input: u32,
    pub api_error: u32,
    pub parse_error: u32,
    pub unclassified: u32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            rate_limited: 10,
            quota_exceeded: 5,
            model_unavailable: 3,
            invalid_input: 5,
            api_error: 10,
            parse_error: 5,
            unclassified: 20,
        }
    }
}

impl AlertThresholds {
    /// Effective threshold for `kind` (never below 1).
    pub fn for_kind(&self, kind: ErrorKind) -> u32 {
        let raw = match kind {
            ErrorKind::RateLimited => self.rate_limited,
            ErrorKind::QuotaExceeded => self.quota_exceeded,
            ErrorKind::ModelUnavailable => self.model_unavailable,
            ErrorKind::InvalidInput => self.invalid_input,
            ErrorKind::ApiError => self.api_error,
            ErrorKind::ParseError => self.parse_error,
            ErrorKind::Unclassified => self.unclassified,
        };
        raw.max(1)
    }

    /// Replace the threshold for one kind.
    pub fn set(mut self, kind: ErrorKind, threshold: u32) -> Self {
        let slot = match kind {
            ErrorKind::RateLimited => &mut self.rate_limited,
            ErrorKind::QuotaExceeded => &mut self.quota_exceeded,
            ErrorKind::ModelUnavailable => &mut self.model_unavailable,
            ErrorKind::InvalidInput => &mut self.invalid_input,
            ErrorKind::ApiError => &mut self.api_error,
            ErrorKind::ParseError => &mut self.parse_error,
            ErrorKind::Unclassified => &mut self.unclassified,
        };
        *slot = threshold;
        self
    }
}

/// Runtime settings for an [`ErrorTracker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    pub thresholds: AlertThresholds,
    /// Characters of call input kept in each record. Default: 200.
    pub input_preview_limit: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            thresholds: AlertThresholds::default(),
            input_preview_limit: DEFAULT_INPUT_PREVIEW_LIMIT,
        }
    }
}

/// Where an [`ErrorStats`] snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsSource {
    /// Aggregated from persisted records over the requested window.
    Persisted,
    /// The in-memory alert counters: only occurrences since each kind's
    /// last alert, regardless of window.
    InMemory,
}

/// Error counts for every [`ErrorKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorStats {
    counts: [u64; ErrorKind::ALL.len()],
    pub source: StatsSource,
}

impl ErrorStats {
    fn empty(source: StatsSource) -> Self {
        Self {
            counts: [0; ErrorKind::ALL.len()],
            source,
        }
    }

    fn from_records(records: &[ErrorRecord]) -> Self {
        let mut stats = Self::empty(StatsSource::Persisted);
        for record in records {
            stats.counts[record.kind.index()] += 1;
        }
        stats
    }

    /// Count for one kind.
    pub fn get(&self, kind: ErrorKind) -> u64 {
        self.counts[kind.index()]
    }

    /// Sum over all kinds.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// `(kind, count)` pairs for every kind, zero counts included.
    pub fn iter(&self) -> impl Iterator<Item = (ErrorKind, u64)> + '_ {
        ErrorKind::ALL.iter().map(|&kind| (kind, self.get(kind)))
    }
}

/// Start of the trailing window of `window_days` ending now.
///
/// Windows reaching past the earliest representable time start there, so
/// they cover every record.
pub fn window_start(window_days: u32) -> DateTime<Utc> {
    TimeDelta::try_days(i64::from(window_days))
        .and_then(|span| Utc::now().checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Classifies, persists and alerts on AI call failures.
///
/// Build with [`ErrorTracker::builder()`] and share behind an [`Arc`].
pub struct ErrorTracker {
    sinks: SinkChain,
    channels: Vec<Arc<dyn AlertChannel>>,
    config: TrackerConfig,
    counters: [AtomicU32; ErrorKind::ALL.len()],
}

impl ErrorTracker {
    pub fn builder() -> ErrorTrackerBuilder {
        ErrorTrackerBuilder::new()
    }

    /// Track one failed AI call. Never fails; returns the assigned kind.
    ///
    /// `endpoint` is the logical operation name (e.g. "lead_summary");
    /// `input_preview` is truncated before it is stored.
    pub async fn track(
        &self,
        failure: &AiFailure,
        endpoint: &str,
        model: &str,
        input_preview: Option<&str>,
    ) -> ErrorKind {
        let kind = classify(failure);
        let due = self.bump(kind);

        metrics::counter!(telemetry::AI_ERRORS_TOTAL, "kind" => kind.as_str()).increment(1);
        error!(kind = %kind, endpoint, model, error = %failure, "AI call failed");

        let record = ErrorRecord::new(
            kind,
            failure,
            endpoint,
            model,
            input_preview,
            self.config.input_preview_limit,
        );
        if let Err(e) = self.sinks.insert(&record).await {
            warn!(
                kind = %kind,
                endpoint,
                error = %e,
                "failed to store AI error record; alerting continues in memory only"
            );
        }

        if let Some(count) = due {
            self.raise(Alert {
                kind,
                count,
                threshold: self.config.thresholds.for_kind(kind),
                raised_at: Utc::now(),
            });
        }
        kind
    }

    /// Per-kind counts over the trailing `window_days`.
    ///
    /// Reads from the sink chain. If every sink fails, falls back to
    /// [`pending_counts()`](Self::pending_counts), which is a weaker view.
    pub async fn get_stats(&self, window_days: u32) -> ErrorStats {
        match self.sinks.query(window_start(window_days)).await {
            Ok(records) => ErrorStats::from_records(&records),
            Err(e) => {
                warn!(window_days, error = %e, "failed to query AI error stats; using in-memory counts");
                self.pending_counts()
            }
        }
    }

    /// Current in-memory counters (occurrences since each kind's last alert).
    pub fn pending_counts(&self) -> ErrorStats {
        let mut stats = ErrorStats::empty(StatsSource::InMemory);
        for kind in ErrorKind::ALL {
            stats.counts[kind.index()] =
                u64::from(self.counters[kind.index()].load(Ordering::Acquire));
        }
        stats
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.config.thresholds
    }

    /// Increment the counter for `kind`, resetting it when it reaches the
    /// threshold. Returns the count that tripped the alert, if any.
    fn bump(&self, kind: ErrorKind) -> Option<u32> {
        let threshold = self.config.thresholds.for_kind(kind);
        let previous = self.counters[kind.index()]
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                let next = count.saturating_add(1);
                Some(if next >= threshold { 0 } else { next })
            })
            .unwrap_or_else(|count| count);
        let reached = previous.saturating_add(1);
        (reached >= threshold).then_some(reached)
    }

    fn raise(&self, alert: Alert) {
        metrics::counter!(telemetry::ALERTS_TOTAL, "kind" => alert.kind.as_str()).increment(1);
        for channel in &self.channels {
            channel.raise(&alert);
        }
    }
}

/// Builder for [`ErrorTracker`].
pub struct ErrorTrackerBuilder {
    sinks: SinkChain,
    channels: Vec<Arc<dyn AlertChannel>>,
    config: TrackerConfig,
}

impl ErrorTrackerBuilder {
    pub fn new() -> Self {
        Self {
            sinks: SinkChain::new(),
            channels: Vec::new(),
            config: TrackerConfig::default(),
        }
    }

    /// Append an error sink. Sinks are tried in the order they are added.
    pub fn sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Replace the sink chain.
    pub fn sinks(mut self, sinks: SinkChain) -> Self {
        self.sinks = sinks;
        self
    }

    /// Add an alert channel. Without any, alerts go to [`LogAlertChannel`].
    pub fn alert_channel(mut self, channel: Arc<dyn AlertChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn thresholds(mut self, thresholds: AlertThresholds) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    pub fn input_preview_limit(mut self, limit: usize) -> Self {
        self.config.input_preview_limit = limit;
        self
    }

    pub fn config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> ErrorTracker {
        let channels = if self.channels.is_empty() {
            vec![Arc::new(LogAlertChannel) as Arc<dyn AlertChannel>]
        } else {
            self.channels
        };
        ErrorTracker {
            sinks: self.sinks,
            channels,
            config: self.config,
            counters: Default::default(),
        }
    }
}

impl Default for ErrorTrackerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
