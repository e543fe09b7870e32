//! Observability and entry retention for the expense store.
//!
//! Two concerns live here:
//!
//! - **Metrics ([`StoreMetrics`])**: hooks into the cache lifecycle (hits,
//!   fetches, invalidations, discarded responses, errors). Implement the
//!   trait for your monitoring system; the default [`NoOpMetrics`] records
//!   nothing, and every event is additionally logged through the `log`
//!   facade regardless of the metrics sink.
//! - **Retention ([`RetentionPolicy`])**: what happens to a cache entry when
//!   its subscriber count returns to zero.
//!
//! # Retention
//!
//! ```
//! use expense_cache::observability::RetentionPolicy;
//! use std::time::Duration;
//!
//! // Keep entries for the whole page session (default)
//! let _policy = RetentionPolicy::Retain;
//!
//! // Drop an entry the moment its last subscriber detaches
//! let _policy = RetentionPolicy::Evict;
//!
//! // Keep it around briefly so quick resubscribes stay warm
//! let _policy = RetentionPolicy::Grace(Duration::from_secs(60));
//! ```
//!
//! | Policy | Use case |
//! |--------|----------|
//! | `Retain` | Small working set; resubscribes should be instant |
//! | `Evict` | Memory-sensitive; entries are cheap to refetch |
//! | `Grace` | Navigation patterns that bounce back within seconds |

use std::time::Duration;

/// Hooks into cache lifecycle events.
pub trait StoreMetrics: Send + Sync {
    /// A query was served from fresh cached data without a fetch.
    fn record_hit(&self, key: &str) {
        debug!("Cache HIT: {}", key);
    }

    /// A fetch completed and was applied.
    fn record_fetch(&self, key: &str, duration: Duration) {
        debug!("Fetch for {} took {:?}", key, duration);
    }

    /// A tag was invalidated, affecting `entries` cache entries.
    fn record_invalidation(&self, tag: &str, entries: usize) {
        debug!("Invalidated tag {} -> {} entries", tag, entries);
    }

    /// A superseded response arrived late and was dropped.
    fn record_discard(&self, key: &str) {
        debug!("Discarded superseded response for {}", key);
    }

    /// A fetch failed.
    fn record_error(&self, key: &str, error: &str) {
        warn!("Fetch ERROR for {}: {}", key, error);
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl StoreMetrics for NoOpMetrics {
    fn record_hit(&self, _key: &str) {}
    fn record_fetch(&self, _key: &str, _duration: Duration) {}
    fn record_invalidation(&self, _tag: &str, _entries: usize) {}
    fn record_discard(&self, _key: &str) {}
    fn record_error(&self, _key: &str, _error: &str) {}
}

/// What happens to a cache entry once its subscriber count returns to zero.
///
/// Freshness in this cache is invalidation-driven, not time-driven, so
/// retention only governs memory: an entry kept around is still refetched
/// when it is stale and resubscribed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Keep the entry for the page session (default).
    #[default]
    Retain,

    /// Remove the entry and its tag associations immediately.
    Evict,

    /// Remove the entry after the duration, unless resubscribed first.
    Grace(Duration),
}
