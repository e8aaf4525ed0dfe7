//! Tests for [`ErrorTracker`]: classification, persistence, threshold alerts.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast::error::TryRecvError;

use muninn::{
    AiFailure, Alert, AlertChannel, AlertThresholds, BroadcastAlertChannel, ErrorKind, ErrorRecord,
    ErrorSink, ErrorTracker, MemoryErrorSink, MuninnError, Result, StatsSource, classify,
};

// ============================================================================
// Test doubles
// ============================================================================

/// Sink that always fails, counting attempts.
#[derive(Default)]
struct UnreachableSink {
    attempts: AtomicU32,
}

#[async_trait]
impl ErrorSink for UnreachableSink {
    fn name(&self) -> &str {
        "unreachable"
    }

    async fn insert(&self, _record: &ErrorRecord) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(MuninnError::Persistence {
            sink: "unreachable".into(),
            message: "Can't reach database server".into(),
        })
    }

    async fn query(&self, _since: DateTime<Utc>) -> Result<Vec<ErrorRecord>> {
        Err(MuninnError::Persistence {
            sink: "unreachable".into(),
            message: "Can't reach database server".into(),
        })
    }
}

/// Alert channel recording every alert it sees.
#[derive(Default)]
struct RecordingChannel {
    alerts: std::sync::Mutex<Vec<Alert>>,
}

impl RecordingChannel {
    fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }
}

impl AlertChannel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    fn raise(&self, alert: &Alert) {
        self.alerts.lock().unwrap().push(alert.clone());
    }
}

fn rate_limited() -> AiFailure {
    AiFailure::api(429, "Rate limit reached for requests")
}

// ============================================================================
// Classification table
// ============================================================================

#[test]
fn quota_exhaustion_is_quota_exceeded() {
    let failure = AiFailure::api(429, "quota").with_code("insufficient_quota");
    assert_eq!(classify(&failure), ErrorKind::QuotaExceeded);
}

#[test]
fn bare_429_is_rate_limited() {
    assert_eq!(classify(&rate_limited()), ErrorKind::RateLimited);
}

#[test]
fn model_not_found_is_model_unavailable() {
    let failure = AiFailure::api(404, "The model does not exist").with_code("model_not_found");
    assert_eq!(classify(&failure), ErrorKind::ModelUnavailable);
}

#[test]
fn invalid_request_type_is_invalid_input() {
    let failure = AiFailure::api(400, "max_tokens too large").with_error_type("invalid_request_error");
    assert_eq!(classify(&failure), ErrorKind::InvalidInput);
}

#[test]
fn rate_limit_outranks_model_and_type_checks() {
    let failure = AiFailure::api(429, "busy")
        .with_code("model_not_found")
        .with_error_type("invalid_request_error");
    assert_eq!(classify(&failure), ErrorKind::RateLimited);
}

#[test]
fn model_check_outranks_type_check() {
    let failure = AiFailure::api(400, "x")
        .with_code("model_not_found")
        .with_error_type("invalid_request_error");
    assert_eq!(classify(&failure), ErrorKind::ModelUnavailable);
}

#[test]
fn syntax_error_is_parse_error() {
    let err = serde_json::from_str::<serde_json::Value>("{\"choices\": [").unwrap_err();
    assert_eq!(classify(&AiFailure::from(err)), ErrorKind::ParseError);
}

#[test]
fn other_failures_are_api_errors() {
    assert_eq!(classify(&AiFailure::api(500, "internal")), ErrorKind::ApiError);
    assert_eq!(
        classify(&AiFailure::transport("connection reset")),
        ErrorKind::ApiError
    );
}

#[test]
fn failure_without_diagnostics_is_unclassified() {
    assert_eq!(classify(&AiFailure::Unspecified), ErrorKind::Unclassified);
}

#[test]
fn openai_quota_body_classifies_as_quota() {
    let body = r#"{"error":{"message":"You exceeded your current quota","type":"insufficient_quota","param":null,"code":"insufficient_quota"}}"#;
    let failure = AiFailure::from_response(429, body);
    assert_eq!(classify(&failure), ErrorKind::QuotaExceeded);
}

// ============================================================================
// Threshold alerting
// ============================================================================

#[tokio::test]
async fn alert_fires_once_on_threshold_then_restarts() {
    let channel = Arc::new(RecordingChannel::default());
    let tracker = ErrorTracker::builder()
        .sink(Arc::new(MemoryErrorSink::new()))
        .alert_channel(channel.clone())
        .build();

    for i in 1..=9 {
        tracker.track(&rate_limited(), "lead_summary", "m", None).await;
        assert!(channel.alerts().is_empty(), "no alert expected after {i} calls");
    }

    tracker.track(&rate_limited(), "lead_summary", "m", None).await;
    let alerts = channel.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, ErrorKind::RateLimited);
    assert_eq!(alerts[0].count, 10);
    assert_eq!(alerts[0].threshold, 10);

    tracker.track(&rate_limited(), "lead_summary", "m", None).await;
    assert_eq!(channel.alerts().len(), 1);
    assert_eq!(tracker.pending_counts().get(ErrorKind::RateLimited), 1);
}

#[tokio::test]
async fn counters_are_independent_per_kind() {
    let channel = Arc::new(RecordingChannel::default());
    let tracker = ErrorTracker::builder().alert_channel(channel.clone()).build();

    for _ in 0..3 {
        tracker.track(&AiFailure::api(500, "boom"), "e", "m", None).await;
    }
    for _ in 0..2 {
        tracker
            .track(&AiFailure::api(404, "gone").with_code("model_not_found"), "e", "m", None)
            .await;
    }

    let pending = tracker.pending_counts();
    assert_eq!(pending.source, StatsSource::InMemory);
    assert_eq!(pending.get(ErrorKind::ApiError), 3);
    assert_eq!(pending.get(ErrorKind::ModelUnavailable), 2);
    assert!(channel.alerts().is_empty());

    tracker
        .track(&AiFailure::api(404, "gone").with_code("model_not_found"), "e", "m", None)
        .await;
    let alerts = channel.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, ErrorKind::ModelUnavailable);
    assert_eq!(tracker.pending_counts().get(ErrorKind::ApiError), 3);
}

#[tokio::test]
async fn custom_thresholds_apply() {
    let channel = Arc::new(RecordingChannel::default());
    let tracker = ErrorTracker::builder()
        .thresholds(AlertThresholds::default().set(ErrorKind::Unclassified, 2))
        .alert_channel(channel.clone())
        .build();

    tracker.track(&AiFailure::Unspecified, "e", "m", None).await;
    tracker.track(&AiFailure::Unspecified, "e", "m", None).await;
    assert_eq!(channel.alerts().len(), 1);
    assert_eq!(channel.alerts()[0].threshold, 2);
}

#[tokio::test]
async fn alerts_reach_broadcast_subscribers() {
    let channel = BroadcastAlertChannel::new();
    let mut rx = channel.subscribe();
    let tracker = ErrorTracker::builder()
        .thresholds(AlertThresholds::default().set(ErrorKind::QuotaExceeded, 1))
        .alert_channel(Arc::new(channel))
        .build();

    let quota = AiFailure::api(429, "quota").with_code("insufficient_quota");
    tracker.track(&quota, "analytics_insights", "m", None).await;

    let alert = rx.recv().await.unwrap();
    assert_eq!(alert.kind, ErrorKind::QuotaExceeded);
    assert_eq!(alert.count, 1);
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_tracking_fires_exactly_once_per_crossing() {
    let channel = Arc::new(RecordingChannel::default());
    let tracker = Arc::new(
        ErrorTracker::builder()
            .alert_channel(channel.clone())
            .build(),
    );

    // 50 rate-limited failures with threshold 10: exactly 5 crossings.
    let mut handles = Vec::new();
    for _ in 0..50 {
        let tracker = Arc::clone(&tracker);
        handles.push(tokio::spawn(async move {
            tracker.track(&rate_limited(), "e", "m", None).await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(channel.alerts().len(), 5);
    assert_eq!(tracker.pending_counts().get(ErrorKind::RateLimited), 0);
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn track_persists_record() {
    let sink = Arc::new(MemoryErrorSink::new());
    let tracker = ErrorTracker::builder()
        .sink(sink.clone())
        .input_preview_limit(10)
        .build();

    let kind = tracker
        .track(
            &AiFailure::api(404, "no such model").with_code("model_not_found"),
            "itinerary_optimization",
            "gpt-3.5-turbo-instruct",
            Some("Title: Two weeks in Lisbon"),
        )
        .await;
    assert_eq!(kind, ErrorKind::ModelUnavailable);

    let records = sink.records().await;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.kind, ErrorKind::ModelUnavailable);
    assert_eq!(record.endpoint, "itinerary_optimization");
    assert_eq!(record.model_name, "gpt-3.5-turbo-instruct");
    assert_eq!(record.message, "no such model");
    assert_eq!(record.input_preview.as_deref(), Some("Title: Two"));
    assert_eq!(record.status, Some(404));
    assert!(!record.resolved);
}

#[tokio::test]
async fn persistence_failure_is_isolated() {
    let sink = Arc::new(UnreachableSink::default());
    let channel = Arc::new(RecordingChannel::default());
    let tracker = ErrorTracker::builder()
        .sink(sink.clone())
        .thresholds(AlertThresholds::default().set(ErrorKind::RateLimited, 3))
        .alert_channel(channel.clone())
        .build();

    for _ in 0..2 {
        let kind = tracker.track(&rate_limited(), "e", "m", None).await;
        assert_eq!(kind, ErrorKind::RateLimited);
    }
    assert_eq!(sink.attempts.load(Ordering::SeqCst), 2);
    assert_eq!(tracker.pending_counts().get(ErrorKind::RateLimited), 2);

    tracker.track(&rate_limited(), "e", "m", None).await;
    assert_eq!(channel.alerts().len(), 1);
}

#[tokio::test]
async fn secondary_sink_receives_record_when_primary_fails() {
    let secondary = Arc::new(MemoryErrorSink::new());
    let tracker = ErrorTracker::builder()
        .sink(Arc::new(UnreachableSink::default()))
        .sink(secondary.clone())
        .build();

    tracker.track(&AiFailure::api(500, "boom"), "e", "m", None).await;
    assert_eq!(secondary.len().await, 1);
}

#[tokio::test]
async fn tracking_without_sinks_still_counts() {
    let tracker = ErrorTracker::builder().build();
    tracker.track(&AiFailure::api(500, "boom"), "e", "m", None).await;
    assert_eq!(tracker.pending_counts().get(ErrorKind::ApiError), 1);
}

// ============================================================================
// Stats
// ============================================================================

#[tokio::test]
async fn stats_aggregate_persisted_records_in_window() {
    let sink = Arc::new(MemoryErrorSink::new());
    let tracker = ErrorTracker::builder()
        .sink(sink.clone())
        .thresholds(AlertThresholds::default().set(ErrorKind::ApiError, 2))
        .build();

    for _ in 0..3 {
        tracker.track(&AiFailure::api(500, "boom"), "e", "m", None).await;
    }
    tracker.track(&rate_limited(), "e", "m", None).await;

    // An old record outside the window.
    let mut old = ErrorRecord::new(
        ErrorKind::ParseError,
        &AiFailure::Parse("eof".into()),
        "e",
        "m",
        None,
        200,
    );
    old.timestamp = Utc::now() - chrono::Duration::days(30);
    sink.insert(&old).await.unwrap();

    let stats = tracker.get_stats(7).await;
    assert_eq!(stats.source, StatsSource::Persisted);
    // Persisted counts are unaffected by alert-driven counter resets.
    assert_eq!(stats.get(ErrorKind::ApiError), 3);
    assert_eq!(stats.get(ErrorKind::RateLimited), 1);
    assert_eq!(stats.get(ErrorKind::ParseError), 0);
    assert_eq!(stats.total(), 4);

    assert_eq!(tracker.get_stats(60).await.get(ErrorKind::ParseError), 1);
}

#[tokio::test]
async fn stats_over_unbounded_window_cover_everything() {
    let sink = Arc::new(MemoryErrorSink::new());
    let tracker = ErrorTracker::builder().sink(sink.clone()).build();

    let mut ancient = ErrorRecord::new(
        ErrorKind::ApiError,
        &AiFailure::api(500, "boom"),
        "e",
        "m",
        None,
        200,
    );
    ancient.timestamp = Utc::now() - chrono::Duration::days(365 * 50);
    sink.insert(&ancient).await.unwrap();
    tracker.track(&rate_limited(), "e", "m", None).await;

    let stats = tracker.get_stats(u32::MAX).await;
    assert_eq!(stats.source, StatsSource::Persisted);
    assert_eq!(stats.get(ErrorKind::ApiError), 1);
    assert_eq!(stats.get(ErrorKind::RateLimited), 1);
}

#[tokio::test]
async fn stats_fall_back_to_in_memory_counts() {
    let tracker = ErrorTracker::builder()
        .sink(Arc::new(UnreachableSink::default()))
        .build();

    tracker.track(&rate_limited(), "e", "m", None).await;
    tracker.track(&rate_limited(), "e", "m", None).await;
    tracker.track(&AiFailure::Unspecified, "e", "m", None).await;

    let stats = tracker.get_stats(7).await;
    assert_eq!(stats.source, StatsSource::InMemory);
    assert_eq!(stats.get(ErrorKind::RateLimited), 2);
    assert_eq!(stats.get(ErrorKind::Unclassified), 1);
    assert_eq!(stats.total(), 3);
}
