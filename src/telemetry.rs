//! Telemetry metric name constants.
//!
//! Centralised metric names for muninn. Consumers install their own
//! `metrics` recorder (e.g. prometheus, statsd); without a recorder
//! installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `muninn_`. Counters end in `_total`.
//!
//! # Common labels
//!
//! - `operation`: cache key prefix, i.e. the logical AI endpoint
//!   (e.g. "lead_summary")
//! - `kind`: persisted error kind name (e.g. "RATE_LIMIT")
//! - `reason`: eviction reason: "expired" (lazy, on read) or "sweep"
//! - `sink`: error sink name (e.g. "memory", "jsonl")

/// Total response cache hits.
///
/// Labels: `operation`.
pub const CACHE_HITS_TOTAL: &str = "muninn_cache_hits_total";

/// Total response cache misses (including expired entries).
///
/// Labels: `operation`.
pub const CACHE_MISSES_TOTAL: &str = "muninn_cache_misses_total";

/// Total entries evicted because they expired.
///
/// Labels: `reason` ("expired" | "sweep").
pub const CACHE_EVICTIONS_TOTAL: &str = "muninn_cache_evictions_total";

/// Total AI call failures tracked.
///
/// Labels: `kind`.
pub const AI_ERRORS_TOTAL: &str = "muninn_ai_errors_total";

/// Total threshold alerts raised.
///
/// Labels: `kind`.
pub const ALERTS_TOTAL: &str = "muninn_alerts_total";

/// Total failed insert/query attempts against an error sink.
///
/// Labels: `sink`.
pub const SINK_FAILURES_TOTAL: &str = "muninn_sink_failures_total";
