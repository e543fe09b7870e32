//! The resource cache: entries, subscriptions, fetch scheduling.
//!
//! [`ExpenseStore`] is the process-wide cache every component shares. It is
//! created once at composition root and passed around by cloning (cheap, an
//! `Arc` increment), never reached through an ambient singleton.
//!
//! # Behavior
//!
//! - One cache entry per [`QueryKey`]; equal keys share the entry and its
//!   subscription channel.
//! - At most one fetch is deliberately in flight per key: a read or refetch
//!   for a key that is already Loading attaches to the outstanding fetch
//!   instead of issuing a duplicate request.
//! - Invalidation supersedes: it marks affected entries stale synchronously
//!   and, for entries with subscribers, issues a fresh fetch immediately.
//!   Each issued fetch carries a generation number; a response is applied
//!   only if its generation is still current, so a late-arriving superseded
//!   response can never overwrite fresher data.
//! - Fetch failures leave prior data untouched; the error rides on the
//!   entry snapshot instead.
//!
//! # Example
//!
//! ```ignore
//! use expense_cache::{ExpenseStore, QueryKey, RestClient};
//!
//! let api = RestClient::new("http://localhost:5000")?;
//! let store = ExpenseStore::new(api);
//!
//! let mut list = store.query(QueryKey::list());
//! let snapshot = list.settled().await;
//! for expense in snapshot.data.and_then(|p| p.as_expenses().map(<[_]>::to_vec)).unwrap_or_default() {
//!     println!("{}: {}", expense.description, expense.amount);
//! }
//! ```

use crate::api::ExpenseApi;
use crate::entry::{EntrySnapshot, FetchStatus, QueryPayload};
use crate::error::Result;
use crate::key::QueryKey;
use crate::observability::{NoOpMetrics, RetentionPolicy, StoreMetrics};
use crate::query::QueryHandle;
use crate::tag::{provided_tags, Tag, TagGraph};
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::watch;

/// One cached query with its bookkeeping.
pub(crate) struct CacheEntry {
    pub(crate) snapshot: EntrySnapshot,
    tx: watch::Sender<EntrySnapshot>,
    pub(crate) subscribers: usize,
    /// Issuance counter; a fetch result is applied only while its issuing
    /// generation is still the current one.
    pub(crate) generation: u64,
    pub(crate) inflight: bool,
    /// Bumped each time the subscriber count returns to zero, so a stale
    /// grace-eviction task can tell whether its retirement is still current.
    retire_epoch: u64,
}

impl Default for CacheEntry {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(EntrySnapshot::default());
        CacheEntry {
            snapshot: EntrySnapshot::default(),
            tx,
            subscribers: 0,
            generation: 0,
            inflight: false,
            retire_epoch: 0,
        }
    }
}

impl CacheEntry {
    fn publish(&self) {
        self.tx.send_replace(self.snapshot.clone());
    }

    fn subscribe(&self) -> watch::Receiver<EntrySnapshot> {
        self.tx.subscribe()
    }

    /// A fetch is needed when nothing fresh exists and none is outstanding.
    fn needs_fetch(&self) -> bool {
        !self.inflight
            && (self.snapshot.stale
                || matches!(self.snapshot.status, FetchStatus::Idle | FetchStatus::Error))
    }
}

pub(crate) struct StoreShared<A: ExpenseApi> {
    pub(crate) api: A,
    entries: DashMap<QueryKey, CacheEntry>,
    graph: Mutex<TagGraph>,
    pub(crate) metrics: Box<dyn StoreMetrics>,
    retention: RetentionPolicy,
}

/// Process-wide expense cache.
///
/// `Clone` shares the same underlying cache; see the module docs.
pub struct ExpenseStore<A: ExpenseApi> {
    pub(crate) shared: Arc<StoreShared<A>>,
}

impl<A: ExpenseApi> Clone for ExpenseStore<A> {
    fn clone(&self) -> Self {
        ExpenseStore {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A: ExpenseApi> ExpenseStore<A> {
    /// Create a store over the given API with default metrics and retention.
    pub fn new(api: A) -> Self {
        Self::with_options(api, Box::new(NoOpMetrics), RetentionPolicy::default())
    }

    /// Create a store with a custom metrics sink.
    pub fn with_metrics(api: A, metrics: Box<dyn StoreMetrics>) -> Self {
        Self::with_options(api, metrics, RetentionPolicy::default())
    }

    /// Create a store with a custom retention policy.
    pub fn with_retention(api: A, retention: RetentionPolicy) -> Self {
        Self::with_options(api, Box::new(NoOpMetrics), retention)
    }

    /// Create a store with both a metrics sink and a retention policy.
    pub fn with_options(
        api: A,
        metrics: Box<dyn StoreMetrics>,
        retention: RetentionPolicy,
    ) -> Self {
        ExpenseStore {
            shared: Arc::new(StoreShared {
                api,
                entries: DashMap::new(),
                graph: Mutex::new(TagGraph::new()),
                metrics,
                retention,
            }),
        }
    }

    /// Get a reference to the underlying API (for advanced use).
    pub fn api(&self) -> &A {
        &self.shared.api
    }

    /// Subscribe to a key, fetching if no fresh data exists.
    ///
    /// The returned handle keeps the subscription alive; dropping it
    /// unsubscribes without cancelling any in-flight request.
    pub fn query(&self, key: QueryKey) -> QueryHandle<A> {
        let (rx, fetch_needed, fresh_hit) = {
            let mut entry = self.entry_mut(&key);
            entry.subscribers += 1;
            let needed = entry.needs_fetch();
            let fresh = !needed && !entry.inflight;
            (entry.subscribe(), needed, fresh)
        };
        if fetch_needed {
            self.issue_fetch(&key);
        } else if fresh_hit {
            self.shared.metrics.record_hit(&key.to_string());
        }
        QueryHandle::new(self.clone(), key, rx)
    }

    /// Current state of a key without subscribing.
    ///
    /// Creates the entry in Loading state and triggers a fetch when it is
    /// absent or stale.
    pub fn read(&self, key: QueryKey) -> EntrySnapshot {
        let (snapshot, fetch_needed) = {
            let entry = self.entry_mut(&key);
            (entry.snapshot.clone(), entry.needs_fetch())
        };
        if !fetch_needed {
            return snapshot;
        }
        self.issue_fetch(&key);
        self.snapshot(&key).unwrap_or(snapshot)
    }

    /// Peek at a key's state with no side effects.
    pub fn snapshot(&self, key: &QueryKey) -> Option<EntrySnapshot> {
        self.shared.entries.get(key).map(|e| e.snapshot.clone())
    }

    /// Replace a key's payload and mark it fresh.
    ///
    /// Used for optimistic pre-updates. The write retires any in-flight
    /// fetch for the key, so a response issued before the write cannot
    /// overwrite it.
    pub fn write(&self, key: QueryKey, payload: QueryPayload) {
        let mut entry = self.entry_mut(&key);
        entry.generation += 1;
        entry.inflight = false;
        entry.snapshot.status = FetchStatus::Success;
        entry.snapshot.data = Some(payload);
        entry.snapshot.error = None;
        entry.snapshot.stale = false;
        entry.publish();
        debug!("✓ wrote {} (generation #{})", key, entry.generation);
    }

    /// Mark every entry providing any of `tags` stale, refetching
    /// immediately where subscribers are attached.
    ///
    /// Entries without subscribers stay stale and refetch on the next
    /// subscription. The stale marking is synchronous; only the refetches
    /// themselves suspend.
    pub fn invalidate(&self, tags: &[Tag]) {
        let affected: HashSet<QueryKey> = {
            let graph = self.graph();
            for tag in tags {
                let n = graph.resolve(std::slice::from_ref(tag)).len();
                self.shared.metrics.record_invalidation(&tag.to_string(), n);
            }
            graph.resolve(tags)
        };
        debug!("» invalidation affects {} entries", affected.len());

        for key in affected {
            let refetch = {
                let Some(mut entry) = self.shared.entries.get_mut(&key) else {
                    continue;
                };
                entry.snapshot.stale = true;
                if entry.subscribers > 0 {
                    true
                } else {
                    entry.publish();
                    false
                }
            };
            if refetch {
                self.issue_fetch(&key);
            }
        }
    }

    /// Imperative refetch escape hatch.
    ///
    /// Attaches to an in-flight fetch for the key rather than duplicating
    /// the network call.
    pub fn refetch(&self, key: &QueryKey) {
        let attach = {
            let entry = self.entry_mut(key);
            entry.inflight
        };
        if attach {
            debug!("refetch for {} attached to in-flight fetch", key);
            return;
        }
        self.issue_fetch(key);
    }

    /// Number of cache entries currently held.
    pub fn len(&self) -> usize {
        self.shared.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.entries.is_empty()
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.shared.entries.contains_key(key)
    }

    /// Active subscriber count for a key.
    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        self.shared.entries.get(key).map_or(0, |e| e.subscribers)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn graph(&self) -> MutexGuard<'_, TagGraph> {
        self.shared.graph.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ensure_entry(&self, key: &QueryKey) {
        if self.shared.entries.contains_key(key) {
            return;
        }
        self.graph().provides(key.clone(), provided_tags(key));
        self.shared.entries.entry(key.clone()).or_default();
        debug!("✓ entry created for {}", key);
    }

    fn entry_mut(&self, key: &QueryKey) -> RefMut<'_, QueryKey, CacheEntry> {
        loop {
            self.ensure_entry(key);
            if let Some(entry) = self.shared.entries.get_mut(key) {
                return entry;
            }
        }
    }

    /// Issue a new fetch for `key`, superseding any outstanding one.
    ///
    /// Callers must not hold a reference into the entry map.
    fn issue_fetch(&self, key: &QueryKey) {
        let generation = {
            let mut entry = self.entry_mut(key);
            entry.generation += 1;
            entry.inflight = true;
            entry.snapshot.status = FetchStatus::Loading;
            entry.publish();
            entry.generation
        };
        debug!("» fetch #{} issued for {}", generation, key);

        let store = self.clone();
        let key = key.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let result = run_fetch(&store.shared.api, &key).await;
            store.apply_fetch(&key, generation, result, started.elapsed());
        });
    }

    /// Apply a fetch outcome if its issuing generation is still current.
    fn apply_fetch(
        &self,
        key: &QueryKey,
        generation: u64,
        result: Result<QueryPayload>,
        elapsed: std::time::Duration,
    ) {
        let Some(mut entry) = self.shared.entries.get_mut(key) else {
            debug!("fetch #{} for {} arrived after eviction, dropped", generation, key);
            return;
        };
        if entry.generation != generation {
            self.shared.metrics.record_discard(&key.to_string());
            debug!(
                "✗ discarding superseded fetch #{} for {} (current is #{})",
                generation, key, entry.generation
            );
            return;
        }

        entry.inflight = false;
        entry.snapshot.stale = false;
        match result {
            Ok(payload) => {
                entry.snapshot.status = FetchStatus::Success;
                entry.snapshot.data = Some(payload);
                entry.snapshot.error = None;
                self.shared.metrics.record_fetch(&key.to_string(), elapsed);
                info!("✓ fetch #{} for {} applied in {:?}", generation, key, elapsed);
            }
            Err(err) => {
                // Prior data stays readable; only the error is surfaced.
                entry.snapshot.status = FetchStatus::Error;
                entry.snapshot.error = Some(err.clone());
                self.shared.metrics.record_error(&key.to_string(), &err.to_string());
                warn!("⚠ fetch #{} for {} failed: {}", generation, key, err);
            }
        }
        entry.publish();
    }

    /// Detach one subscriber; applies the retention policy at zero.
    pub(crate) fn unsubscribe(&self, key: &QueryKey) {
        let retired = {
            let Some(mut entry) = self.shared.entries.get_mut(key) else {
                return;
            };
            entry.subscribers = entry.subscribers.saturating_sub(1);
            if entry.subscribers == 0 {
                entry.retire_epoch += 1;
                Some(entry.retire_epoch)
            } else {
                None
            }
        };
        let Some(epoch) = retired else { return };

        match self.shared.retention {
            RetentionPolicy::Retain => {}
            RetentionPolicy::Evict => self.evict(key),
            RetentionPolicy::Grace(grace) => {
                let store = self.clone();
                let key = key.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(grace).await;
                    let still_retired = store
                        .shared
                        .entries
                        .get(&key)
                        .map(|e| e.subscribers == 0 && e.retire_epoch == epoch)
                        .unwrap_or(false);
                    if still_retired {
                        store.evict(&key);
                    }
                });
            }
        }
    }

    /// Drop an entry and its tag associations.
    ///
    /// Used by delete mutations to retire an id permanently and by the
    /// retention policy. Subscribed receivers observe a closed channel.
    pub(crate) fn evict(&self, key: &QueryKey) {
        if self.shared.entries.remove(key).is_some() {
            self.graph().forget(key);
            debug!("✓ evicted {}", key);
        }
    }
}

/// Dispatch a key to its API operation.
async fn run_fetch<A: ExpenseApi>(api: &A, key: &QueryKey) -> Result<QueryPayload> {
    match key {
        QueryKey::ExpenseList { search } => api
            .list_expenses(search.as_deref())
            .await
            .map(QueryPayload::Expenses),
        QueryKey::ExpenseDetail { id } => {
            api.get_expense(id).await.map(QueryPayload::Expense)
        }
        QueryKey::Summary { range } => {
            api.fetch_summary(range.as_ref()).await.map(QueryPayload::Summary)
        }
    }
}
