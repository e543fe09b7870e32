//! The observable face of a cache entry.

use crate::error::Error;
use crate::model::{Expense, Summary};
use std::fmt;

/// Fetch state of a cache entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FetchStatus {
    /// Entry exists but no fetch has been issued yet.
    #[default]
    Idle,

    /// A fetch is outstanding. Prior data, if any, is still readable.
    Loading,

    /// The last applied fetch succeeded.
    Success,

    /// The last applied fetch failed; the error is on the snapshot and any
    /// prior data is left untouched.
    Error,
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStatus::Idle => write!(f, "Idle"),
            FetchStatus::Loading => write!(f, "Loading"),
            FetchStatus::Success => write!(f, "Success"),
            FetchStatus::Error => write!(f, "Error"),
        }
    }
}

/// Payload held by a cache entry, one variant per key family.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryPayload {
    Expenses(Vec<Expense>),
    Expense(Expense),
    Summary(Summary),
}

impl QueryPayload {
    pub fn as_expenses(&self) -> Option<&[Expense]> {
        match self {
            QueryPayload::Expenses(expenses) => Some(expenses),
            _ => None,
        }
    }

    pub fn as_expense(&self) -> Option<&Expense> {
        match self {
            QueryPayload::Expense(expense) => Some(expense),
            _ => None,
        }
    }

    pub fn as_summary(&self) -> Option<&Summary> {
        match self {
            QueryPayload::Summary(summary) => Some(summary),
            _ => None,
        }
    }
}

/// Point-in-time view of a cache entry, as delivered to subscribers.
#[derive(Clone, Debug, Default)]
pub struct EntrySnapshot {
    pub status: FetchStatus,
    pub data: Option<QueryPayload>,
    pub error: Option<Error>,
    /// Known-outdated: an invalidation has hit this entry and a refetch is
    /// pending or in flight.
    pub stale: bool,
}

impl EntrySnapshot {
    pub fn is_loading(&self) -> bool {
        self.status == FetchStatus::Loading
    }

    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == FetchStatus::Error
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// Settled means a fetch outcome has been applied, success or error.
    pub fn is_settled(&self) -> bool {
        matches!(self.status, FetchStatus::Success | FetchStatus::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;

    fn expense(id: &str) -> Expense {
        Expense {
            id: id.to_string(),
            description: "Coffee".to_string(),
            amount: 50.0,
            category: Category::Food,
            created_at: "2024-01-03T10:00:00Z".to_string(),
            updated_at: "2024-01-03T10:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_payload_accessors() {
        let payload = QueryPayload::Expenses(vec![expense("exp_1")]);
        assert_eq!(payload.as_expenses().map(<[Expense]>::len), Some(1));
        assert!(payload.as_expense().is_none());
        assert!(payload.as_summary().is_none());

        let payload = QueryPayload::Expense(expense("exp_1"));
        assert_eq!(payload.as_expense().map(|e| e.id.as_str()), Some("exp_1"));
    }

    #[test]
    fn test_snapshot_defaults_idle() {
        let snapshot = EntrySnapshot::default();
        assert_eq!(snapshot.status, FetchStatus::Idle);
        assert!(!snapshot.is_settled());
        assert!(!snapshot.has_data());
        assert!(!snapshot.stale);
    }

    #[test]
    fn test_snapshot_flags() {
        let snapshot = EntrySnapshot {
            status: FetchStatus::Loading,
            ..EntrySnapshot::default()
        };
        assert!(snapshot.is_loading());
        assert!(!snapshot.is_settled());

        let snapshot = EntrySnapshot {
            status: FetchStatus::Error,
            error: Some(Error::NetworkError("down".to_string())),
            ..EntrySnapshot::default()
        };
        assert!(snapshot.is_error());
        assert!(snapshot.is_settled());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(FetchStatus::Idle.to_string(), "Idle");
        assert_eq!(FetchStatus::Loading.to_string(), "Loading");
        assert_eq!(FetchStatus::Success.to_string(), "Success");
        assert_eq!(FetchStatus::Error.to_string(), "Error");
    }
}
