//! Caching subsystem.
//!
//! - [`ResponseCache`]: process-local TTL cache for AI call results, with
//!   cache-aside access via [`ResponseCache::get_or_compute()`] and an
//!   optional background sweep ([`SweepHandle`]).
//!
//! - [`cache_key()`]: deterministic `"{operation}:{sha256}"` keys over a
//!   canonical JSON form of the call input.

mod key;
pub mod response;
mod sweep;

pub use key::cache_key;
pub use response::{CacheConfig, DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL, ResponseCache};
pub use sweep::SweepHandle;
