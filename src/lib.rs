//! Muninn - response caching and failure tracking for AI API calls
//!
//! This crate shields calls to external AI text-generation APIs with two
//! cooperating components:
//!
//! - [`ResponseCache`]: a process-local TTL cache used cache-aside, keyed
//!   by a deterministic hash of the call's logical inputs ([`cache_key`]).
//! - [`ErrorTracker`]: classifies failures into a fixed taxonomy
//!   ([`ErrorKind`]), persists each occurrence through [`ErrorSink`]s and
//!   raises per-kind threshold [`Alert`]s.
//!
//! [`AiGuard`] composes both so a use case always gets a value back: a
//! fresh or cached result, or its own fallback when the call fails.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use muninn::{AiCall, AiFailure, AiGuard, CacheConfig, ErrorTracker, MemoryErrorSink, ResponseCache};
//!
//! #[tokio::main]
//! async fn main() {
//!     let cache = Arc::new(ResponseCache::<String>::new(&CacheConfig::default()));
//!     let _sweeper = cache.spawn_sweeper();
//!     let tracker = Arc::new(
//!         ErrorTracker::builder()
//!             .sink(Arc::new(MemoryErrorSink::new()))
//!             .build(),
//!     );
//!     let guard = AiGuard::new(cache, tracker);
//!
//!     let lead = serde_json::json!({"id": "lead-42", "status": "QUALIFIED"});
//!     let summary = guard
//!         .run(
//!             &AiCall::new("lead_summary", "gpt-3.5-turbo-instruct"),
//!             &lead,
//!             || async { Err::<String, _>(AiFailure::api(503, "overloaded")) },
//!             || "Failed to generate summary. Please try again later.".to_string(),
//!         )
//!         .await;
//!
//!     assert!(summary.degraded);
//! }
//! ```

pub mod alert;
pub mod cache;
pub mod config;
pub mod error;
pub mod guard;
pub mod sink;
pub mod telemetry;
pub mod tracker;

// Re-export main types at crate root
pub use alert::{Alert, AlertChannel, BroadcastAlertChannel, LogAlertChannel};
pub use cache::{CacheConfig, ResponseCache, SweepHandle, cache_key};
pub use config::Config;
pub use error::{MuninnError, Result};
pub use guard::{AiCall, AiGuard, GuardOutcome};
pub use sink::{ErrorSink, JsonLinesErrorSink, MemoryErrorSink, SinkChain};
pub use tracker::{
    AiFailure, AlertThresholds, ErrorKind, ErrorRecord, ErrorStats, ErrorTracker, StatsSource,
    TrackerConfig, classify,
};
