//! Cache key derivation.
//!
//! A [`QueryKey`] identifies one cache entry: the endpoint plus its
//! parameters, as a value type with structural equality. Two components
//! asking for the same data with equal parameters land on the same key and
//! therefore share one entry and one subscription.

use crate::model::DateRange;
use std::fmt;

/// Deterministic identifier for a cached query.
///
/// The `Display` rendering is canonical (`family:operation[:params]`) and is
/// what logging and metrics report.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// The expense list, optionally filtered by a search string.
    ExpenseList { search: Option<String> },

    /// A single expense by id.
    ExpenseDetail { id: String },

    /// The category summary, optionally bounded by a date range.
    Summary { range: Option<DateRange> },
}

impl QueryKey {
    /// Key for the unfiltered expense list.
    pub fn list() -> Self {
        QueryKey::ExpenseList { search: None }
    }

    /// Key for a filtered expense list.
    ///
    /// The search string is trimmed; a blank search collapses onto the
    /// unfiltered list key, matching the request the adapter would issue.
    pub fn list_search(search: &str) -> Self {
        let trimmed = search.trim();
        QueryKey::ExpenseList {
            search: if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            },
        }
    }

    /// Key for one expense's detail view.
    pub fn detail(id: impl Into<String>) -> Self {
        QueryKey::ExpenseDetail { id: id.into() }
    }

    /// Key for the summary aggregate.
    pub fn summary(range: Option<DateRange>) -> Self {
        QueryKey::Summary { range }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::ExpenseList { search: None } => write!(f, "expenses:list"),
            QueryKey::ExpenseList { search: Some(s) } => write!(f, "expenses:list?search={}", s),
            QueryKey::ExpenseDetail { id } => write!(f, "expenses:detail:{}", id),
            QueryKey::Summary { range: None } => write!(f, "expenses:summary"),
            QueryKey::Summary { range: Some(r) } => write!(f, "expenses:summary:{}", r),
        }
    }
}
