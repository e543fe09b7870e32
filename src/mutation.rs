//! Mutations: create, update, delete, bulk delete.
//!
//! Each mutation performs exactly one write against the API, never reads
//! the cache, and declares its invalidation tag set only on success. Input
//! is validated at the boundary first, so obviously bad payloads are
//! rejected before any network call. On failure nothing is invalidated and
//! the classified error is returned to the caller.
//!
//! The `*_with` variants accept [`MutationHooks`]: `on_success` /
//! `on_error` fire per outcome and `on_settled` fires on every outcome,
//! which is where dialog-closing style cleanup belongs.

use crate::api::ExpenseApi;
use crate::error::{Error, Result};
use crate::key::QueryKey;
use crate::model::{Expense, ExpenseDraft, ExpensePatch};
use crate::store::ExpenseStore;
use crate::tag::{created_tags, touched_tags, Tag};
use futures::future::join_all;
use std::fmt;

/// Lifecycle callbacks for a mutation.
///
/// All methods have no-op defaults; implement only what you need.
/// `on_settled` runs after `on_success`/`on_error`, regardless of outcome,
/// including client-side validation rejections.
pub trait MutationHooks<T>: Send {
    fn on_success(&mut self, _value: &T) {}
    fn on_error(&mut self, _error: &Error) {}
    fn on_settled(&mut self) {}
}

/// Hook implementation that does nothing.
pub struct NoHooks;

impl<T> MutationHooks<T> for NoHooks {}

fn settle<T, H: MutationHooks<T>>(hooks: &mut H, result: &Result<T>) {
    match result {
        Ok(value) => hooks.on_success(value),
        Err(error) => hooks.on_error(error),
    }
    hooks.on_settled();
}

/// Per-id outcome of a bulk delete.
///
/// Bulk delete is not atomic: the ids in `deleted` are gone from the server
/// and have been invalidated locally even when `failed` is non-empty.
#[derive(Clone, Debug, Default)]
pub struct BulkDeleteReport {
    pub deleted: Vec<String>,
    pub failed: Vec<(String, Error)>,
}

impl BulkDeleteReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.deleted.len() + self.failed.len()
    }
}

/// Aggregate failure of a partially or fully failed bulk delete.
#[derive(Clone, Debug)]
pub struct BulkDeleteError(pub BulkDeleteReport);

impl fmt::Display for BulkDeleteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} deletes failed",
            self.0.failed.len(),
            self.0.attempted()
        )?;
        if let Some((id, error)) = self.0.failed.first() {
            write!(f, "; first failure ({}): {}", id, error)?;
        }
        Ok(())
    }
}

impl std::error::Error for BulkDeleteError {}

impl<A: ExpenseApi> ExpenseStore<A> {
    /// Create an expense and invalidate the collection.
    ///
    /// # Errors
    ///
    /// `Error::ValidationError` before any network call for an invalid
    /// draft; otherwise the classified API failure.
    pub async fn create(&self, draft: ExpenseDraft) -> Result<Expense> {
        self.create_with(draft, &mut NoHooks).await
    }

    /// [`create`](Self::create) with lifecycle hooks.
    pub async fn create_with<H: MutationHooks<Expense>>(
        &self,
        draft: ExpenseDraft,
        hooks: &mut H,
    ) -> Result<Expense> {
        let result = self.run_create(&draft).await;
        settle(hooks, &result);
        result
    }

    async fn run_create(&self, draft: &ExpenseDraft) -> Result<Expense> {
        draft.validate()?;
        let created = self.shared.api.create_expense(draft).await?;
        info!("✓ created expense {}", created.id);
        self.invalidate(&created_tags());
        Ok(created)
    }

    /// Update an expense in place and invalidate its entity tag plus the
    /// collection.
    ///
    /// # Errors
    ///
    /// `Error::ValidationError` before any network call for an invalid or
    /// empty patch; otherwise the classified API failure.
    pub async fn update(&self, id: &str, patch: ExpensePatch) -> Result<Expense> {
        self.update_with(id, patch, &mut NoHooks).await
    }

    /// [`update`](Self::update) with lifecycle hooks.
    pub async fn update_with<H: MutationHooks<Expense>>(
        &self,
        id: &str,
        patch: ExpensePatch,
        hooks: &mut H,
    ) -> Result<Expense> {
        let result = self.run_update(id, &patch).await;
        settle(hooks, &result);
        result
    }

    async fn run_update(&self, id: &str, patch: &ExpensePatch) -> Result<Expense> {
        patch.validate()?;
        let updated = self.shared.api.update_expense(id, patch).await?;
        info!("✓ updated expense {}", updated.id);
        self.invalidate(&touched_tags(id));
        Ok(updated)
    }

    /// Delete an expense, retiring its id permanently.
    ///
    /// The detail entry is evicted outright rather than marked stale, so a
    /// deleted id can never be served from stale data; the collection is
    /// invalidated as usual.
    ///
    /// # Errors
    ///
    /// The classified API failure; nothing is evicted or invalidated then.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.delete_with(id, &mut NoHooks).await
    }

    /// [`delete`](Self::delete) with lifecycle hooks.
    pub async fn delete_with<H: MutationHooks<()>>(
        &self,
        id: &str,
        hooks: &mut H,
    ) -> Result<()> {
        let result = self.run_delete(id).await;
        settle(hooks, &result);
        result
    }

    async fn run_delete(&self, id: &str) -> Result<()> {
        self.shared.api.delete_expense(id).await?;
        info!("✓ deleted expense {}", id);
        self.evict(&QueryKey::detail(id));
        self.invalidate(&touched_tags(id));
        Ok(())
    }

    /// Delete several expenses as independent operations.
    ///
    /// All deletes are issued concurrently. Partial failure still evicts
    /// and invalidates for the ids that succeeded; any failure turns the
    /// whole call into a [`BulkDeleteError`] carrying the per-id outcomes.
    pub async fn delete_many(
        &self,
        ids: &[String],
    ) -> std::result::Result<BulkDeleteReport, BulkDeleteError> {
        let api = &self.shared.api;
        let deletions = ids
            .iter()
            .map(|id| async move { (id.clone(), api.delete_expense(id).await) });
        let outcomes = join_all(deletions).await;

        let mut report = BulkDeleteReport::default();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(()) => report.deleted.push(id),
                Err(error) => report.failed.push((id, error)),
            }
        }

        if !report.deleted.is_empty() {
            let mut tags = vec![Tag::Expenses];
            for id in &report.deleted {
                self.evict(&QueryKey::detail(id.clone()));
                tags.push(Tag::Expense(id.clone()));
            }
            self.invalidate(&tags);
        }

        if report.is_complete() {
            info!("✓ bulk delete removed {} expenses", report.deleted.len());
            Ok(report)
        } else {
            warn!(
                "⚠ bulk delete: {} of {} deletes failed",
                report.failed.len(),
                report.attempted()
            );
            Err(BulkDeleteError(report))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::InMemoryApi;
    use crate::model::Category;

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

    #[derive(Default)]
    struct RecordingHooks {
        events: Vec<&'static str>,
    }

    impl<T> MutationHooks<T> for RecordingHooks {
        fn on_success(&mut self, _value: &T) {
            self.events.push("success");
        }
        fn on_error(&mut self, _error: &Error) {
            self.events.push("error");
        }
        fn on_settled(&mut self) {
            self.events.push("settled");
        }
    }

    #[tokio::test]
    async fn test_create_refetches_subscribed_list() {
        let api = InMemoryApi::new();
        let store = ExpenseStore::new(api.clone());

        let mut list = store.query(QueryKey::list());
        list.settled().await;

        store
            .create(ExpenseDraft::new("Coffee", 50.0, Category::Food))
            .await
            .expect("create should succeed");

        let snapshot = list.settled().await;
        let descriptions: Vec<String> = snapshot
            .data
            .and_then(|p| p.as_expenses().map(|e| e.iter().map(|x| x.description.clone()).collect()))
            .unwrap_or_default();
        assert_eq!(descriptions, vec!["Coffee".to_string()]);
        assert_eq!(api.calls().create, 1);
        assert_eq!(api.calls().list, 2);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_amount_before_any_network_call() {
        let api = InMemoryApi::new();
        let store = ExpenseStore::new(api.clone());

        let err = store
            .create(ExpenseDraft::new("Coffee", 0.0, Category::Food))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ValidationError(_)));

        let err = store
            .create(ExpenseDraft::new("Coffee", -5.0, Category::Food))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ValidationError(_)));

        assert_eq!(api.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_hooks_fire_success_then_settled() {
        let api = InMemoryApi::new();
        let store = ExpenseStore::new(api);

        let mut hooks = RecordingHooks::default();
        store
            .create_with(ExpenseDraft::new("Coffee", 50.0, Category::Food), &mut hooks)
            .await
            .expect("create should succeed");

        assert_eq!(hooks.events, vec!["success", "settled"]);
    }

    #[tokio::test]
    async fn test_settled_fires_on_validation_rejection() {
        let api = InMemoryApi::new();
        let store = ExpenseStore::new(api.clone());

        let mut hooks = RecordingHooks::default();
        let result = store
            .create_with(ExpenseDraft::new("Coffee", 0.0, Category::Food), &mut hooks)
            .await;

        assert!(result.is_err());
        assert_eq!(hooks.events, vec!["error", "settled"]);
        assert_eq!(api.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_update_refetches_detail_and_list() {
        let api = InMemoryApi::new();
        api.seed(seeded("a", "Coffee", 50.0));
        let store = ExpenseStore::new(api.clone());

        let mut list = store.query(QueryKey::list());
        let mut detail = store.query(QueryKey::detail("a"));
        list.settled().await;
        detail.settled().await;

        store
            .update("a", ExpensePatch::new().amount(75.0))
            .await
            .expect("update should succeed");

        let detail_amount = detail
            .settled()
            .await
            .data
            .and_then(|p| p.as_expense().map(|e| e.amount));
        assert_eq!(detail_amount, Some(75.0));

        let list_amount = list
            .settled()
            .await
            .data
            .and_then(|p| p.as_expenses().map(|e| e[0].amount));
        assert_eq!(list_amount, Some(75.0));
    }

    #[tokio::test]
    async fn test_update_rejects_empty_patch() {
        let api = InMemoryApi::new();
        api.seed(seeded("a", "Coffee", 50.0));
        let store = ExpenseStore::new(api.clone());

        let err = store.update("a", ExpensePatch::new()).await.unwrap_err();
        assert!(matches!(err, Error::ValidationError(_)));
        assert_eq!(api.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_failed_mutation_invalidates_nothing() {
        let api = InMemoryApi::new();
        api.seed(seeded("a", "Coffee", 50.0));
        let store = ExpenseStore::new(api.clone());

        let mut list = store.query(QueryKey::list());
        list.settled().await;
        assert_eq!(api.calls().list, 1);

        api.fail_next(Error::BadRequest("Amount must be positive".to_string()));
        let err = store
            .update("a", ExpensePatch::new().amount(75.0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(api.calls().list, 1);
        assert!(!list.snapshot().stale);
    }

    #[tokio::test]
    async fn test_delete_evicts_detail_entry() {
        let api = InMemoryApi::new();
        api.seed(seeded("a", "Coffee", 50.0));
        let store = ExpenseStore::new(api.clone());

        let mut list = store.query(QueryKey::list());
        list.settled().await;
        {
            let mut detail = store.query(QueryKey::detail("a"));
            detail.settled().await;
        }
        assert!(store.contains(&QueryKey::detail("a")));

        store.delete("a").await.expect("delete should succeed");

        assert!(!store.contains(&QueryKey::detail("a")));
        let snapshot = list.settled().await;
        let len = snapshot
            .data
            .and_then(|p| p.as_expenses().map(<[Expense]>::len));
        assert_eq!(len, Some(0));
    }

    #[tokio::test]
    async fn test_bulk_delete_partial_failure_invalidates_successes() {
        let api = InMemoryApi::new();
        api.seed(seeded("a", "Coffee", 50.0));
        api.seed(seeded("b", "Tea", 30.0));
        let store = ExpenseStore::new(api.clone());

        let mut list = store.query(QueryKey::list());
        list.settled().await;

        let ids = vec!["a".to_string(), "ghost".to_string(), "b".to_string()];
        let err = store.delete_many(&ids).await.unwrap_err();

        let mut deleted = err.0.deleted.clone();
        deleted.sort();
        assert_eq!(deleted, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.0.failed.len(), 1);
        assert_eq!(err.0.failed[0].0, "ghost");
        assert!(err.to_string().contains("1 of 3"));

        // The list still reflects the successful removals.
        let snapshot = list.settled().await;
        let len = snapshot
            .data
            .and_then(|p| p.as_expenses().map(<[Expense]>::len));
        assert_eq!(len, Some(0));
    }

    #[tokio::test]
    async fn test_bulk_delete_all_success() {
        let api = InMemoryApi::new();
        api.seed(seeded("a", "Coffee", 50.0));
        api.seed(seeded("b", "Tea", 30.0));
        let store = ExpenseStore::new(api.clone());

        let ids = vec!["a".to_string(), "b".to_string()];
        let report = store.delete_many(&ids).await.expect("bulk delete should succeed");

        assert!(report.is_complete());
        assert_eq!(report.attempted(), 2);
        assert!(api.is_empty());
    }
}
