//! Cache-aside AI calls with failure tracking and fallback.
//!
//! [`AiGuard`] is the glue a use case (lead summaries, itinerary
//! optimisation, analytics insights, ...) puts around its AI transport:
//!
//! ```text
//!   run(call, input, producer, fallback)
//!          │
//!          ▼
//!   cache_key(endpoint, input) ──► ResponseCache::get_or_compute
//!                                        │ hit / Ok      │ Err(AiFailure)
//!                                        ▼               ▼
//!                                     value       ErrorTracker::track
//!                                                        │
//!                                                        ▼
//!                                                   fallback()
//! ```
//!
//! The caller always gets a value; failures are classified and recorded
//! instead of being propagated.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::cache::{ResponseCache, cache_key};
use crate::tracker::{AiFailure, ErrorTracker};

/// Identity of one AI call, as seen by the cache and the tracker.
#[derive(Debug, Clone, Copy)]
pub struct AiCall<'a> {
    /// Logical operation name; cache key prefix and TTL override lookup.
    pub endpoint: &'a str,
    /// Model name recorded with failures.
    pub model: &'a str,
    /// Human-readable input excerpt recorded with failures.
    pub input_preview: Option<&'a str>,
}

impl<'a> AiCall<'a> {
    pub fn new(endpoint: &'a str, model: &'a str) -> Self {
        Self {
            endpoint,
            model,
            input_preview: None,
        }
    }

    pub fn input_preview(mut self, preview: &'a str) -> Self {
        self.input_preview = Some(preview);
        self
    }
}

/// Result of [`AiGuard::run()`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardOutcome<V> {
    pub value: V,
    /// `true` when `value` came from the fallback because the call failed.
    pub degraded: bool,
}

impl<V> GuardOutcome<V> {
    pub fn into_inner(self) -> V {
        self.value
    }
}

/// Runs AI calls through a [`ResponseCache`] and an [`ErrorTracker`].
pub struct AiGuard<V> {
    cache: Arc<ResponseCache<V>>,
    tracker: Arc<ErrorTracker>,
}

impl<V> Clone for AiGuard<V> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            tracker: Arc::clone(&self.tracker),
        }
    }
}

impl<V> AiGuard<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(cache: Arc<ResponseCache<V>>, tracker: Arc<ErrorTracker>) -> Self {
        Self { cache, tracker }
    }

    pub fn cache(&self) -> &Arc<ResponseCache<V>> {
        &self.cache
    }

    pub fn tracker(&self) -> &Arc<ErrorTracker> {
        &self.tracker
    }

    /// Run `producer` for `input`, reusing a cached result when live.
    ///
    /// The cache key is derived from `call.endpoint` and `input`, and the
    /// TTL from the endpoint's override (or the cache default). If `input`
    /// cannot be serialized the call runs uncached. On producer failure the
    /// failure is tracked and `fallback()` is returned with `degraded` set.
    pub async fn run<I, F, Fut, D>(
        &self,
        call: &AiCall<'_>,
        input: &I,
        producer: F,
        fallback: D,
    ) -> GuardOutcome<V>
    where
        I: Serialize + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, AiFailure>>,
        D: FnOnce() -> V,
    {
        let result = match cache_key(call.endpoint, input) {
            Ok(key) => {
                let ttl = self.cache.ttl_for(call.endpoint);
                self.cache.get_or_compute(&key, Some(ttl), producer).await
            }
            Err(e) => {
                warn!(endpoint = call.endpoint, error = %e, "cannot derive cache key; calling uncached");
                producer().await
            }
        };

        match result {
            Ok(value) => GuardOutcome {
                value,
                degraded: false,
            },
            Err(failure) => {
                self.tracker
                    .track(&failure, call.endpoint, call.model, call.input_preview)
                    .await;
                GuardOutcome {
                    value: fallback(),
                    degraded: true,
                }
            }
        }
    }
}
