//! Threshold alert delivery.
//!
//! When an error kind's counter reaches its threshold, the tracker builds
//! an [`Alert`] and hands it to every registered [`AlertChannel`].
//! Delivery is fire-and-forget: channels must not block and cannot fail
//! the tracked call.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;

use crate::tracker::ErrorKind;

/// Default capacity of a [`BroadcastAlertChannel`].
const DEFAULT_BROADCAST_CAPACITY: usize = 64;

/// A threshold crossing for one error kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub kind: ErrorKind,
    /// Occurrences counted since the previous alert for this kind.
    pub count: u32,
    pub threshold: u32,
    pub raised_at: DateTime<Utc>,
}

/// Destination for threshold alerts.
pub trait AlertChannel: Send + Sync {
    /// Channel name for logging/debugging.
    fn name(&self) -> &str;

    /// Deliver an alert. Must return promptly; spawn if delivery does I/O.
    fn raise(&self, alert: &Alert);
}

/// Writes alerts to the log at `warn` level. Used when no channel is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertChannel;

impl AlertChannel for LogAlertChannel {
    fn name(&self) -> &str {
        "log"
    }

    fn raise(&self, alert: &Alert) {
        warn!(
            kind = %alert.kind,
            count = alert.count,
            threshold = alert.threshold,
            "AI error threshold reached"
        );
    }
}

/// Fans alerts out to in-process subscribers (e.g. a notification service).
///
/// Raising with no live subscriber drops the alert silently; lagging
/// subscribers lose the oldest alerts.
#[derive(Debug, Clone)]
pub struct BroadcastAlertChannel {
    tx: broadcast::Sender<Alert>,
}

impl BroadcastAlertChannel {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BROADCAST_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastAlertChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertChannel for BroadcastAlertChannel {
    fn name(&self) -> &str {
        "broadcast"
    }

    fn raise(&self, alert: &Alert) {
        // Err only means nobody is subscribed.
        let _ = self.tx.send(alert.clone());
    }
}
