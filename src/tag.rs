//! Tags and the tag invalidation graph.
//!
//! A [`Tag`] names a class of cached data a mutation can mark stale. Tags
//! are a closed enum rather than free-form strings so that invalidation is
//! exhaustive and checkable at compile time. The [`TagGraph`] keeps the
//! bipartite mapping between tags and the cache keys that provide them.

use crate::key::QueryKey;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Label denoting a class of cached data.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Collection-level: covers every view whose membership or ordering can
    /// change when any expense does, i.e. the list and the summary.
    Expenses,

    /// Per-entity: covers the detail view of one expense id.
    Expense(String),
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Expenses => write!(f, "expenses"),
            Tag::Expense(id) => write!(f, "expense:{}", id),
        }
    }
}

/// Tags invalidated by creating an expense.
///
/// Only the collection-level tag: the new entity's per-entity tag cannot be
/// provided by any existing cache entry yet.
pub fn created_tags() -> Vec<Tag> {
    vec![Tag::Expenses]
}

/// Tags invalidated by updating or deleting the expense with `id`.
///
/// Both the per-entity tag and the collection-level tag, since the list
/// view's ordering, membership, or displayed fields may change.
pub fn touched_tags(id: &str) -> Vec<Tag> {
    vec![Tag::Expense(id.to_string()), Tag::Expenses]
}

/// Tags a cache entry provides, fixed per key shape.
///
/// List and summary entries provide the collection tag; detail entries
/// provide only their own per-entity tag, so creating a new expense does not
/// refetch every open detail view.
pub fn provided_tags(key: &QueryKey) -> Vec<Tag> {
    match key {
        QueryKey::ExpenseList { .. } => vec![Tag::Expenses],
        QueryKey::ExpenseDetail { id } => vec![Tag::Expense(id.clone())],
        QueryKey::Summary { .. } => vec![Tag::Expenses],
    }
}

/// Bipartite mapping between tags and the cache keys providing them.
#[derive(Debug, Default)]
pub struct TagGraph {
    by_tag: HashMap<Tag, HashSet<QueryKey>>,
    by_key: HashMap<QueryKey, HashSet<Tag>>,
}

impl TagGraph {
    pub fn new() -> Self {
        TagGraph::default()
    }

    /// Register the tags `key` provides, replacing any prior association.
    pub fn provides(&mut self, key: QueryKey, tags: impl IntoIterator<Item = Tag>) {
        self.forget(&key);
        let tags: HashSet<Tag> = tags.into_iter().collect();
        for tag in &tags {
            self.by_tag.entry(tag.clone()).or_default().insert(key.clone());
        }
        self.by_key.insert(key, tags);
    }

    /// Resolve a tag set to the keys it affects.
    pub fn resolve(&self, tags: &[Tag]) -> HashSet<QueryKey> {
        let mut keys = HashSet::new();
        for tag in tags {
            if let Some(tagged) = self.by_tag.get(tag) {
                keys.extend(tagged.iter().cloned());
            }
        }
        keys
    }

    /// Remove a retired key from both sides of the mapping.
    pub fn forget(&mut self, key: &QueryKey) {
        if let Some(tags) = self.by_key.remove(key) {
            for tag in tags {
                if let Some(keys) = self.by_tag.get_mut(&tag) {
                    keys.remove(key);
                    if keys.is_empty() {
                        self.by_tag.remove(&tag);
                    }
                }
            }
        }
    }

    /// Tags currently registered for a key.
    pub fn tags_for(&self, key: &QueryKey) -> Option<&HashSet<Tag>> {
        self.by_key.get(key)
    }

    /// Number of keys with registered tags.
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
