//! Live query subscriptions.

use crate::api::ExpenseApi;
use crate::entry::{EntrySnapshot, QueryPayload};
use crate::error::Error;
use crate::key::QueryKey;
use crate::store::ExpenseStore;
use tokio::sync::watch;

/// A live subscription to one cache entry.
///
/// Obtained from [`ExpenseStore::query`]. The handle exposes the entry's
/// current snapshot and wakes on every update (fetch application,
/// invalidation, optimistic write). Dropping the handle unsubscribes; any
/// in-flight request keeps running for the remaining subscribers or a later
/// resubscribe.
///
/// # Example
///
/// ```ignore
/// let mut query = store.query(QueryKey::list());
/// let snapshot = query.settled().await;
/// if snapshot.is_error() {
///     show_inline_failure(snapshot.error.expect("error set").user_message());
/// }
/// ```
pub struct QueryHandle<A: ExpenseApi> {
    store: ExpenseStore<A>,
    key: QueryKey,
    rx: watch::Receiver<EntrySnapshot>,
}

impl<A: ExpenseApi> QueryHandle<A> {
    pub(crate) fn new(
        store: ExpenseStore<A>,
        key: QueryKey,
        rx: watch::Receiver<EntrySnapshot>,
    ) -> Self {
        QueryHandle { store, key, rx }
    }

    /// The key this handle is subscribed to.
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Current state of the entry.
    pub fn snapshot(&self) -> EntrySnapshot {
        self.rx.borrow().clone()
    }

    /// Current payload, if any.
    pub fn data(&self) -> Option<QueryPayload> {
        self.snapshot().data
    }

    /// Current error, if the last fetch failed.
    pub fn error(&self) -> Option<Error> {
        self.snapshot().error
    }

    pub fn is_loading(&self) -> bool {
        self.snapshot().is_loading()
    }

    /// Wait for the next entry update.
    ///
    /// Returns `None` once the entry has been evicted (for example after
    /// its id was deleted); the handle detaches without error.
    pub async fn changed(&mut self) -> Option<EntrySnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until the entry has a settled fetch outcome (success or error).
    ///
    /// Returns immediately when the entry is already settled. If the entry
    /// is evicted mid-wait, the last observed snapshot is returned.
    pub async fn settled(&mut self) -> EntrySnapshot {
        loop {
            let snapshot = self.rx.borrow_and_update().clone();
            if snapshot.is_settled() && !snapshot.stale {
                return snapshot;
            }
            if self.rx.changed().await.is_err() {
                return self.rx.borrow().clone();
            }
        }
    }

    /// Imperatively refetch this query's key.
    ///
    /// Attaches to an in-flight fetch rather than duplicating it.
    pub fn refetch(&self) {
        self.store.refetch(&self.key);
    }
}

impl<A: ExpenseApi> Drop for QueryHandle<A> {
    fn drop(&mut self) {
        self.store.unsubscribe(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::InMemoryApi;
    use crate::model::{Category, Expense, ExpensePatch};
    use crate::tag::Tag;

    fn seeded(id: &str, description: &str, amount: f64) -> Expense {
        Expense {
            id: id.to_string(),
            description: description.to_string(),
            amount,
            category: Category::Food,
            created_at: "2024-01-03T10:00:00Z".to_string(),
            updated_at: "2024-01-03T10:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn test_handle_reports_status_flags() {
        let api = InMemoryApi::new();
        api.seed(seeded("a", "Coffee", 50.0));
        let store = ExpenseStore::new(api);

        let mut query = store.query(QueryKey::list());
        assert!(query.is_loading());

        let snapshot = query.settled().await;
        assert!(snapshot.is_success());
        assert!(!query.is_loading());
        assert!(query.error().is_none());
        assert!(query.data().is_some());
        assert_eq!(query.key(), &QueryKey::list());
    }

    #[tokio::test]
    async fn test_changed_wakes_on_invalidation() {
        let api = InMemoryApi::new();
        api.seed(seeded("a", "Coffee", 50.0));
        let store = ExpenseStore::new(api.clone());

        let mut query = store.query(QueryKey::list());
        query.settled().await;

        api.update_expense("a", &ExpensePatch::new().amount(75.0))
            .await
            .expect("update should succeed");
        store.invalidate(&[Tag::Expenses]);

        // First wake is the Loading transition, then the applied refetch.
        let snapshot = query.settled().await;
        let amount = snapshot
            .data
            .and_then(|p| p.as_expenses().map(|e| e[0].amount));
        assert_eq!(amount, Some(75.0));
    }

    #[tokio::test]
    async fn test_drop_unsubscribes_without_cancelling() {
        let api = InMemoryApi::new();
        api.seed(seeded("a", "Coffee", 50.0));
        let store = ExpenseStore::new(api.clone());

        api.delay_next(std::time::Duration::from_millis(40));
        {
            let _query = store.query(QueryKey::list());
            tokio::task::yield_now().await;
        }
        assert_eq!(store.subscriber_count(&QueryKey::list()), 0);

        // The in-flight fetch still completes and lands in the entry.
        tokio::time::sleep(std::time::Duration::from_millis(80)).await;
        let snapshot = store.snapshot(&QueryKey::list()).expect("entry retained");
        assert!(snapshot.is_success());
        assert_eq!(api.calls().list, 1);
    }

    #[tokio::test]
    async fn test_changed_returns_none_after_eviction() {
        let api = InMemoryApi::new();
        api.seed(seeded("a", "Coffee", 50.0));
        let store = ExpenseStore::new(api);

        let mut query = store.query(QueryKey::detail("a"));
        query.settled().await;

        store.evict(&QueryKey::detail("a"));
        assert!(query.changed().await.is_none());
    }

    #[tokio::test]
    async fn test_handle_refetch_updates_data() {
        let api = InMemoryApi::new();
        api.seed(seeded("a", "Coffee", 50.0));
        let store = ExpenseStore::new(api.clone());

        let mut query = store.query(QueryKey::list());
        query.settled().await;

        api.seed(seeded("b", "Tea", 30.0));
        query.refetch();
        let snapshot = query.settled().await;

        let len = snapshot
            .data
            .and_then(|p| p.as_expenses().map(<[Expense]>::len));
        assert_eq!(len, Some(2));
        assert_eq!(api.calls().list, 2);
    }
}
