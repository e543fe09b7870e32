//! Domain model: expense records, mutation payloads, and the summary aggregate.
//!
//! Validation lives at this boundary, not in the cache: drafts and patches
//! are checked before any network call so that obviously bad input (zero or
//! negative amounts, out-of-bounds descriptions) never leaves the client.

use crate::error::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum accepted description length, in characters.
pub const DESCRIPTION_MIN: usize = 3;

/// Maximum accepted description length, in characters.
pub const DESCRIPTION_MAX: usize = 100;

/// Expense category.
///
/// A closed set; the server stores and returns the capitalized name.
/// `Other` is the fallback when no category is given.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Food,
    Transport,
    Entertainment,
    Utilities,
    #[default]
    Other,
}

impl Category {
    /// All categories, in display order.
    pub const ALL: [Category; 5] = [
        Category::Food,
        Category::Transport,
        Category::Entertainment,
        Category::Utilities,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "Food",
            Category::Transport => "Transport",
            Category::Entertainment => "Entertainment",
            Category::Utilities => "Utilities",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single expense record as held by the server.
///
/// `id`, `created_at` and `updated_at` are server-assigned; the cache treats
/// the timestamps as opaque display data and never orders by them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub description: String,
    pub amount: f64,
    #[serde(default)]
    pub category: Category,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}

/// Payload for creating a new expense.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExpenseDraft {
    pub description: String,
    pub amount: f64,
    pub category: Category,
}

impl ExpenseDraft {
    pub fn new(description: impl Into<String>, amount: f64, category: Category) -> Self {
        ExpenseDraft {
            description: description.into(),
            amount,
            category,
        }
    }

    /// Validate the draft at the form boundary.
    ///
    /// # Errors
    ///
    /// Returns `Error::ValidationError` for a description outside 3–100
    /// characters or a non-positive / non-finite amount. Must be called
    /// before submission; the mutations in this crate do so.
    pub fn validate(&self) -> Result<()> {
        validate_description(&self.description)?;
        validate_amount(self.amount)
    }
}

/// Partial update for an existing expense.
///
/// Absent fields are omitted from the PATCH body entirely, so the server
/// leaves them untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ExpensePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
}

impl ExpensePatch {
    pub fn new() -> Self {
        ExpensePatch::default()
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.amount.is_none() && self.category.is_none()
    }

    /// Validate present fields; an empty patch is rejected.
    ///
    /// # Errors
    ///
    /// Returns `Error::ValidationError` under the same per-field rules as
    /// [`ExpenseDraft::validate`].
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::ValidationError(
                "Nothing to update: the patch is empty".to_string(),
            ));
        }
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        if let Some(amount) = self.amount {
            validate_amount(amount)?;
        }
        Ok(())
    }
}

fn validate_description(description: &str) -> Result<()> {
    let len = description.chars().count();
    if len < DESCRIPTION_MIN || len > DESCRIPTION_MAX {
        return Err(Error::ValidationError(format!(
            "Description must be between {} and {} characters",
            DESCRIPTION_MIN, DESCRIPTION_MAX
        )));
    }
    Ok(())
}

fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::ValidationError(
            "Amount must be a positive number".to_string(),
        ));
    }
    Ok(())
}

/// Inclusive calendar date range for summary queries.
///
/// Both ends are always present; the UI only issues ranged queries once both
/// dates are picked. Rendered `yyyy-MM-dd` on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// # Errors
    ///
    /// Returns `Error::ValidationError` when `end` precedes `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(Error::ValidationError(
                "End date must not precede start date".to_string(),
            ));
        }
        Ok(DateRange { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Wire value for the `startDate` query parameter.
    pub fn start_param(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    /// Wire value for the `endDate` query parameter.
    pub fn end_param(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start_param(), self.end_param())
    }
}

/// Per-category share of a summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategorySlice {
    pub category: Category,
    pub amount: f64,
    pub percentage: f64,
}

/// Server-computed aggregate over the expenses in a date range.
///
/// Read-only: never mutated locally, always refetched after invalidation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total: f64,
    pub items: u64,
    pub categories: Vec<CategorySlice>,
}
