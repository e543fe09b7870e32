//! The transport seam between the cache and the expense server.
//!
//! [`ExpenseApi`] decouples the store from any specific transport. The
//! shipping implementation is [`crate::client::RestClient`]; tests use
//! [`InMemoryApi`], an in-process stand-in for the server.
//!
//! # Mocking for Tests
//!
//! `InMemoryApi` lets cache-using code run without a network:
//!
//! ```ignore
//! let api = InMemoryApi::new();
//! api.seed(expense);                   // control what the "server" holds
//! api.fail_next(Error::NetworkError("down".into()));
//! api.delay_next(Duration::from_millis(50));
//!
//! let store = ExpenseStore::new(api.clone());
//! // assert on api.calls() to verify exactly how many requests were made
//! ```

use crate::error::{Error, Result};
use crate::model::{Category, CategorySlice, DateRange, Expense, ExpenseDraft, ExpensePatch, Summary};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Operations the cache layer needs from the expense server.
///
/// Mirrors the REST surface one-to-one. Implementations classify every
/// failure into [`Error`]; `Ok(..)` always carries the decoded payload.
#[async_trait]
pub trait ExpenseApi: Send + Sync + 'static {
    /// Fetch all expenses, optionally filtered by a search string.
    async fn list_expenses(&self, search: Option<&str>) -> Result<Vec<Expense>>;

    /// Fetch one expense by id. A retired or unknown id is an error.
    async fn get_expense(&self, id: &str) -> Result<Expense>;

    /// Create an expense and return the server-assigned record.
    async fn create_expense(&self, draft: &ExpenseDraft) -> Result<Expense>;

    /// Apply a partial update and return the updated record.
    async fn update_expense(&self, id: &str, patch: &ExpensePatch) -> Result<Expense>;

    /// Delete one expense by id.
    async fn delete_expense(&self, id: &str) -> Result<()>;

    /// Fetch the category summary, optionally bounded by a date range.
    async fn fetch_summary(&self, range: Option<&DateRange>) -> Result<Summary>;
}

// ============================================================================
// In-Memory Test API
// ============================================================================

/// Per-operation call counters, for asserting on request traffic in tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list: usize,
    pub get: usize,
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub summary: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.list + self.get + self.create + self.update + self.delete + self.summary
    }
}

/// Planned behavior for the next call: respond late, fail, or both.
#[derive(Clone, Debug, Default)]
struct Plan {
    delay: Option<Duration>,
    fail: Option<Error>,
}

#[derive(Default)]
struct ApiState {
    expenses: Vec<Expense>,
    next_id: u64,
    planned: VecDeque<Plan>,
    calls: CallCounts,
}

enum Op {
    List,
    Get,
    Create,
    Update,
    Delete,
    Summary,
}

/// In-process expense server for tests.
///
/// Behaves like the real server: assigns ids and timestamps, filters the
/// list by search string, computes the summary, and answers unknown ids
/// with a structured not-found error. On top of that it supports planned
/// failures ([`fail_next`](InMemoryApi::fail_next)), artificial response
/// latency ([`delay_next`](InMemoryApi::delay_next)), and per-operation
/// call counting ([`calls`](InMemoryApi::calls)).
///
/// Operations are applied at request time; a planned delay postpones only
/// the response, like latency on the wire. Clones share state.
#[derive(Clone, Default)]
pub struct InMemoryApi {
    state: Arc<Mutex<ApiState>>,
}

impl InMemoryApi {
    pub fn new() -> Self {
        InMemoryApi::default()
    }

    /// Insert an expense exactly as given, id and timestamps included.
    pub fn seed(&self, expense: Expense) {
        self.lock().expenses.push(expense);
    }

    /// Number of expenses currently held.
    pub fn len(&self) -> usize {
        self.lock().expenses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().expenses.is_empty()
    }

    /// Snapshot of the stored expenses.
    pub fn expenses(&self) -> Vec<Expense> {
        self.lock().expenses.clone()
    }

    /// Call counters so far.
    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    /// Postpone the response of the next call by `delay`.
    pub fn delay_next(&self, delay: Duration) {
        self.lock().planned.push_back(Plan {
            delay: Some(delay),
            fail: None,
        });
    }

    /// Fail the next call with `error` instead of performing it.
    pub fn fail_next(&self, error: Error) {
        self.lock().planned.push_back(Plan {
            delay: None,
            fail: Some(error),
        });
    }

    fn lock(&self) -> MutexGuard<'_, ApiState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Count the call and take its planned behavior, if any.
    fn checkpoint(&self, op: Op) -> Plan {
        let mut state = self.lock();
        match op {
            Op::List => state.calls.list += 1,
            Op::Get => state.calls.get += 1,
            Op::Create => state.calls.create += 1,
            Op::Update => state.calls.update += 1,
            Op::Delete => state.calls.delete += 1,
            Op::Summary => state.calls.summary += 1,
        }
        state.planned.pop_front().unwrap_or_default()
    }

    fn now_stamp() -> String {
        chrono::Utc::now().to_rfc3339()
    }

    fn not_found() -> Error {
        Error::BadRequest("expense not found".to_string())
    }
}

/// Calendar date of an RFC 3339 timestamp, if it parses.
fn created_date(stamp: &str) -> Option<NaiveDate> {
    chrono::DateTime::parse_from_rfc3339(stamp)
        .ok()
        .map(|dt| dt.date_naive())
}

fn compute_summary(expenses: &[Expense], range: Option<&DateRange>) -> Summary {
    let in_range: Vec<&Expense> = expenses
        .iter()
        .filter(|e| match range {
            None => true,
            Some(r) => created_date(&e.created_at).is_some_and(|d| r.contains(d)),
        })
        .collect();

    let total: f64 = in_range.iter().map(|e| e.amount).sum();
    let categories = Category::ALL
        .iter()
        .filter_map(|&category| {
            let amount: f64 = in_range
                .iter()
                .filter(|e| e.category == category)
                .map(|e| e.amount)
                .sum();
            if amount > 0.0 {
                Some(CategorySlice {
                    category,
                    amount,
                    percentage: if total > 0.0 { amount / total * 100.0 } else { 0.0 },
                })
            } else {
                None
            }
        })
        .collect();

    Summary {
        total,
        items: in_range.len() as u64,
        categories,
    }
}

#[async_trait]
impl ExpenseApi for InMemoryApi {
    async fn list_expenses(&self, search: Option<&str>) -> Result<Vec<Expense>> {
        let plan = self.checkpoint(Op::List);
        let outcome = match plan.fail {
            Some(err) => Err(err),
            None => {
                let state = self.lock();
                let needle = search.map(str::to_lowercase);
                Ok(state
                    .expenses
                    .iter()
                    .filter(|e| match &needle {
                        None => true,
                        Some(n) => e.description.to_lowercase().contains(n),
                    })
                    .cloned()
                    .collect())
            }
        };
        if let Some(delay) = plan.delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }

    async fn get_expense(&self, id: &str) -> Result<Expense> {
        let plan = self.checkpoint(Op::Get);
        let outcome = match plan.fail {
            Some(err) => Err(err),
            None => {
                let state = self.lock();
                state
                    .expenses
                    .iter()
                    .find(|e| e.id == id)
                    .cloned()
                    .ok_or_else(Self::not_found)
            }
        };
        if let Some(delay) = plan.delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }

    async fn create_expense(&self, draft: &ExpenseDraft) -> Result<Expense> {
        let plan = self.checkpoint(Op::Create);
        let outcome = match plan.fail {
            Some(err) => Err(err),
            None => {
                let mut state = self.lock();
                let id = loop {
                    state.next_id += 1;
                    let candidate = format!("exp_{}", state.next_id);
                    if !state.expenses.iter().any(|e| e.id == candidate) {
                        break candidate;
                    }
                };
                let stamp = Self::now_stamp();
                let expense = Expense {
                    id,
                    description: draft.description.clone(),
                    amount: draft.amount,
                    category: draft.category,
                    created_at: stamp.clone(),
                    updated_at: stamp,
                };
                state.expenses.push(expense.clone());
                Ok(expense)
            }
        };
        if let Some(delay) = plan.delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }

    async fn update_expense(&self, id: &str, patch: &ExpensePatch) -> Result<Expense> {
        let plan = self.checkpoint(Op::Update);
        let outcome = match plan.fail {
            Some(err) => Err(err),
            None => {
                let mut state = self.lock();
                match state.expenses.iter_mut().find(|e| e.id == id) {
                    Some(expense) => {
                        if let Some(description) = &patch.description {
                            expense.description = description.clone();
                        }
                        if let Some(amount) = patch.amount {
                            expense.amount = amount;
                        }
                        if let Some(category) = patch.category {
                            expense.category = category;
                        }
                        expense.updated_at = Self::now_stamp();
                        Ok(expense.clone())
                    }
                    None => Err(Self::not_found()),
                }
            }
        };
        if let Some(delay) = plan.delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }

    async fn delete_expense(&self, id: &str) -> Result<()> {
        let plan = self.checkpoint(Op::Delete);
        let outcome = match plan.fail {
            Some(err) => Err(err),
            None => {
                let mut state = self.lock();
                match state.expenses.iter().position(|e| e.id == id) {
                    Some(index) => {
                        state.expenses.remove(index);
                        Ok(())
                    }
                    None => Err(Self::not_found()),
                }
            }
        };
        if let Some(delay) = plan.delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }

    async fn fetch_summary(&self, range: Option<&DateRange>) -> Result<Summary> {
        let plan = self.checkpoint(Op::Summary);
        let outcome = match plan.fail {
            Some(err) => Err(err),
            None => {
                let state = self.lock();
                Ok(compute_summary(&state.expenses, range))
            }
        };
        if let Some(delay) = plan.delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }
}
