//! Bounded-history rule: an owner keeps only their newest datasets.

use std::cmp::Ordering;

use crate::types::Dataset;

/// Default number of datasets kept per owner.
pub const DEFAULT_RETENTION_LIMIT: usize = 5;

/// Keep-the-newest-N policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    limit: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_LIMIT)
    }
}

/// Outcome of applying the policy to one owner's datasets.
#[derive(Debug, Clone, PartialEq)]
pub struct RetentionPlan<'a> {
    /// Survivors, most recent first.
    pub keep: Vec<&'a Dataset>,
    /// Datasets to delete, oldest first.
    pub evict: Vec<&'a Dataset>,
}

impl RetentionPolicy {
    /// A limit of zero is raised to one: the dataset just committed always survives.
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Split `existing` plus `newest` into keep and evict lists.
    ///
    /// `existing` may or may not already contain `newest`; ids are deduplicated. Ordering is by
    /// creation time descending, then id descending.
    pub fn plan<'a>(&self, existing: &'a [Dataset], newest: &'a Dataset) -> RetentionPlan<'a> {
        let mut all: Vec<&Dataset> = existing.iter().filter(|d| d.id != newest.id).collect();
        all.push(newest);
        all.sort_by(|a, b| newest_first(a, b));

        let evict_from = self.limit.min(all.len());
        let mut evict = all.split_off(evict_from);
        evict.reverse();

        RetentionPlan { keep: all, evict }
    }
}

/// Ordering used for every "most recent first" listing.
pub fn newest_first(a: &Dataset, b: &Dataset) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}
