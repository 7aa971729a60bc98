//! # Content List Reconciler
//!
//! Keeps the displayed content list free of duplicates while completions and
//! list refreshes race each other. Merging an item whose identity is already
//! present is a no-op, so replaying any merge leaves the list unchanged.

use bridge_traits::ContentItem;
use core_runtime::config::ContentOrdering;
use std::collections::HashSet;

/// Items with a stable backend identity
pub trait Identified {
    fn identity(&self) -> &str;
}

impl Identified for ContentItem {
    fn identity(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone)]
pub struct Reconciler<T> {
    items: Vec<T>,
    ordering: ContentOrdering,
}

pub type ContentReconciler = Reconciler<ContentItem>;

impl<T: Identified> Reconciler<T> {
    pub fn new(ordering: ContentOrdering) -> Self {
        Self {
            items: Vec::new(),
            ordering,
        }
    }

    /// Start from an existing list in display order. Later duplicates of an
    /// identity are dropped.
    pub fn with_items(items: impl IntoIterator<Item = T>, ordering: ContentOrdering) -> Self {
        let mut seen = HashSet::new();
        let mut kept = Vec::new();
        for item in items {
            if seen.insert(item.identity().to_string()) {
                kept.push(item);
            }
        }
        Self {
            items: kept,
            ordering,
        }
    }

    /// Merge one item. Returns whether it was added.
    pub fn merge(&mut self, item: T) -> bool {
        if self.contains(item.identity()) {
            return false;
        }
        match self.ordering {
            ContentOrdering::NewestFirst => self.items.insert(0, item),
            ContentOrdering::Append => self.items.push(item),
        }
        true
    }

    /// Merge a list given in display order, keeping that relative order.
    /// Returns the number of items added.
    pub fn merge_all(&mut self, items: impl IntoIterator<Item = T>) -> usize {
        let mut seen = HashSet::new();
        let batch: Vec<T> = items
            .into_iter()
            .filter(|item| seen.insert(item.identity().to_string()))
            .collect();

        let mut added = 0;
        match self.ordering {
            // Prepending one at a time would reverse the batch.
            ContentOrdering::NewestFirst => {
                for item in batch.into_iter().rev() {
                    added += usize::from(self.merge(item));
                }
            }
            ContentOrdering::Append => {
                for item in batch {
                    added += usize::from(self.merge(item));
                }
            }
        }
        added
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.items.iter().any(|item| item.identity() == identity)
    }

    pub fn get(&self, identity: &str) -> Option<&T> {
        self.items.iter().find(|item| item.identity() == identity)
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ordering(&self) -> ContentOrdering {
        self.ordering
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}
