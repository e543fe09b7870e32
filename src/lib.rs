//! # expense-cache
//!
//! A tag-invalidated, subscription-aware client-side cache for expense
//! tracking REST APIs.
//!
//! ## Features
//!
//! - **One entry per key:** queries with equal parameters share a cache
//!   entry and a single subscription channel
//! - **Request de-duplication:** at most one deliberate in-flight fetch per
//!   key; concurrent readers attach instead of duplicating the call
//! - **Tag invalidation:** mutations declare a closed, statically checked
//!   tag set; invalidation marks dependents stale synchronously and
//!   refetches wherever subscribers are attached
//! - **Issuance-order application:** a superseded response arriving late is
//!   discarded, never applied over fresher data
//! - **Classified failures:** every error is `BadRequest`, `NetworkError`,
//!   `ParseError`, `ValidationError`, or `Unknown`, independent of which
//!   operation raised it
//! - **Testable by construction:** the transport is a trait; `InMemoryApi`
//!   ships with failure injection, latency injection, and call counting
//!
//! ## Quick Start
//!
//! ```ignore
//! use expense_cache::{
//!     Category, ExpenseDraft, ExpenseStore, QueryKey, RestClient,
//! };
//!
//! // 1. One base URL is the only required configuration
//! let api = RestClient::new("http://localhost:5000")?;
//!
//! // 2. Create the store once, at app start; clone it everywhere
//! let store = ExpenseStore::new(api);
//!
//! // 3. Components subscribe through queries
//! let mut list = store.query(QueryKey::list());
//! let snapshot = list.settled().await;
//!
//! // 4. Mutations validate, write, and invalidate; subscribers refetch
//! store
//!     .create(ExpenseDraft::new("Coffee", 50.0, Category::Food))
//!     .await?;
//! let snapshot = list.settled().await; // now includes "Coffee"
//! ```
//!
//! ## Consistency model
//!
//! The cache never patches entries across components; the only mutation
//! discipline is *invalidate by tag, then refetch*. Deleted ids are retired
//! permanently: their detail entries are evicted, not marked stale, so
//! stale data cannot resurrect them.

#[macro_use]
extern crate log;

pub mod api;
#[cfg(feature = "rest")]
pub mod client;
pub mod entry;
pub mod error;
pub mod key;
pub mod model;
pub mod mutation;
pub mod observability;
pub mod query;
pub mod store;
pub mod tag;

// Re-exports for convenience
pub use api::{CallCounts, ExpenseApi, InMemoryApi};
#[cfg(feature = "rest")]
pub use client::RestClient;
pub use entry::{EntrySnapshot, FetchStatus, QueryPayload};
pub use error::{Error, Result};
pub use key::QueryKey;
pub use model::{
    Category, CategorySlice, DateRange, Expense, ExpenseDraft, ExpensePatch, Summary,
};
pub use mutation::{BulkDeleteError, BulkDeleteReport, MutationHooks, NoHooks};
pub use observability::{NoOpMetrics, RetentionPolicy, StoreMetrics};
pub use query::QueryHandle;
pub use store::ExpenseStore;
pub use tag::{created_tags, provided_tags, touched_tags, Tag, TagGraph};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
