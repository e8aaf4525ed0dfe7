//! TTL response cache for AI call results.
//!
//! [`ResponseCache`] implements the cache-aside pattern around expensive
//! external calls: [`get_or_compute()`](ResponseCache::get_or_compute)
//! returns a live cached value without running the producer, or runs the
//! producer once and stores its result until the entry's TTL passes.
//!
//! # Expiry
//!
//! Every entry carries an absolute expiry instant. Correctness comes from
//! the read path alone: [`get()`](ResponseCache::get) treats an expired
//! entry as absent and evicts it. The background sweep (see
//! [`spawn_sweeper()`](ResponseCache::spawn_sweeper)) only bounds memory
//! for keys that are never read again. There is no sliding expiration; an
//! entry's lifetime is refreshed only by a new write.
//!
//! # Concurrency
//!
//! Entries live in a [`DashMap`]. Both eviction paths re-check expiry under
//! the shard lock (`remove_if` / `retain`), so an entry refreshed by a
//! concurrent write is never removed by a stale decision.
//!
//! Time is read from [`tokio::time::Instant`], so tests can drive expiry
//! with a paused clock.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use super::key::operation_of;
use super::sweep::{self, SweepHandle};
use crate::telemetry;

/// Default time-to-live: 24 hours.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 3600);

/// Default interval between background sweeps: 1 hour.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Expiry used when `now + ttl` overflows the clock (roughly 30 years).
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Configuration for the response cache.
///
/// ```rust
/// # use muninn::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .ttl(Duration::from_secs(3600))
///     .sweep_interval(Duration::from_secs(600))
///     .ttl_override("lead_summary", Duration::from_secs(900));
/// assert_eq!(config.ttl_overrides["lead_summary"], Duration::from_secs(900));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL applied when a write does not name one. Default: 24 hours.
    pub default_ttl: Duration,
    /// Interval between background sweeps. Default: 1 hour.
    pub sweep_interval: Duration,
    /// Per-operation TTLs, keyed on operation name.
    pub ttl_overrides: HashMap<String, Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            ttl_overrides: HashMap::new(),
        }
    }
}

impl CacheConfig {
    /// Create a new config with the default TTL and sweep interval.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default time-to-live.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the interval between background sweeps.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Override the TTL for one operation.
    pub fn ttl_override(mut self, operation: impl Into<String>, ttl: Duration) -> Self {
        self.ttl_overrides.insert(operation.into(), ttl);
        self
    }
}

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Process-local TTL cache keyed on strings produced by [`cache_key`](super::cache_key).
///
/// Construct one per process (or per DI scope) and share it behind an
/// [`Arc`]. Values are cloned out on every hit, so `V` should be cheap to
/// clone (`String`, `Arc<T>`, ...).
pub struct ResponseCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    default_ttl: Duration,
    sweep_interval: Duration,
    ttl_overrides: HashMap<String, Duration>,
}

impl<V> ResponseCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl: config.default_ttl,
            sweep_interval: config.sweep_interval,
            ttl_overrides: config.ttl_overrides.clone(),
        }
    }

    /// TTL for an operation: its override if configured, else the default.
    pub fn ttl_for(&self, operation: &str) -> Duration {
        self.ttl_overrides
            .get(operation)
            .copied()
            .unwrap_or(self.default_ttl)
    }

    /// Look up a live entry.
    ///
    /// Returns `None` on miss. An expired entry counts as a miss and is
    /// evicted. Emits cache hit/miss metrics.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        // The read guard must be released before `remove_if` touches the same shard.
        let lookup = self
            .entries
            .get(key)
            .map(|entry| (!entry.is_expired(now)).then(|| entry.value.clone()));

        match lookup {
            Some(Some(value)) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "operation" => operation_of(key).to_owned())
                    .increment(1);
                Some(value)
            }
            Some(None) => {
                if self
                    .entries
                    .remove_if(key, |_, entry| entry.is_expired(now))
                    .is_some()
                {
                    metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "reason" => "expired")
                        .increment(1);
                }
                self.record_miss(key);
                None
            }
            None => {
                self.record_miss(key);
                None
            }
        }
    }

    /// Store a value under `key` until `now + ttl`.
    ///
    /// A `None` value is ignored: absence is never cached. A `None` TTL
    /// uses the configured default. Any existing entry is replaced.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Option<V>>, ttl: Option<Duration>) {
        let Some(value) = value.into() else {
            return;
        };
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl.unwrap_or(self.default_ttl))
            .unwrap_or_else(|| now + FAR_FUTURE);
        self.entries
            .insert(key.into(), CacheEntry { value, expires_at });

        let size = self.entries.len();
        if size % 10 == 0 {
            debug!(size, "response cache size");
        }
    }

    /// Return the cached value for `key`, or run `producer` and cache its result.
    ///
    /// On a hit the producer is not invoked. On a miss the producer runs
    /// once; `Ok` values are stored with `ttl` (default TTL if `None`) and
    /// returned, `Err` values are returned as-is and nothing is cached.
    ///
    /// Concurrent misses for the same key each run their own producer; the
    /// last successful write wins.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        producer: F,
    ) -> std::result::Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = producer().await?;
        self.insert(key, value.clone(), ttl);
        Ok(value)
    }

    /// Remove an entry. Returns whether one was present (live or expired).
    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evict every expired entry. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        // Concurrent inserts can make `len` grow during the sweep.
        let removed = before.saturating_sub(self.entries.len());

        if removed > 0 {
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "reason" => "sweep")
                .increment(removed as u64);
            debug!(
                removed,
                size = self.entries.len(),
                "swept expired response cache entries"
            );
        }
        removed
    }

    /// Start the background sweep at the configured interval.
    ///
    /// The task holds a weak reference and exits on its own once the cache
    /// is dropped. Stop it earlier with [`SweepHandle::stop()`]; dropping
    /// the handle aborts it.
    pub fn spawn_sweeper(self: &Arc<Self>) -> SweepHandle {
        sweep::spawn(Arc::downgrade(self), self.sweep_interval)
    }

    fn record_miss(&self, key: &str) {
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "operation" => operation_of(key).to_owned())
            .increment(1);
    }
}
