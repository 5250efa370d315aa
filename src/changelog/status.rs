//! Changelog status tracking

use crate::changelog::{PlannedAction, RanChangeSet};

/// Applied and pending changesets for a changelog against one database
#[derive(Debug, Clone)]
pub struct ChangelogStatus {
    /// Rows of the tracking table, in execution order
    pub applied: Vec<RanChangeSet>,

    /// Changesets the next update would run
    pub pending: Vec<PendingChangeSet>,

    /// Changesets excluded by the context or label filter
    pub filtered_count: usize,
}

/// A changeset that the next update would run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChangeSet {
    pub id: String,
    pub author: String,
    pub file: String,
    pub checksum: String,
    /// `Execute` or `Rerun`
    pub action: PlannedAction,
}

impl ChangelogStatus {
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
