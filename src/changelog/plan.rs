//! Deciding what an update will do with each changeset

use crate::changelog::{ChangeSet, ChangelogError, RanChangeSet, TagFilter};
use std::collections::HashMap;

/// What an update does with one changeset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedAction {
    /// Never applied: run it and insert a tracking row
    Execute,
    /// Applied before but `runAlways`, or changed and `runOnChange`: run it and update the row
    Rerun,
    /// Applied and unchanged
    AlreadyRan,
    /// Excluded by the context or label filter
    Filtered,
}

impl PlannedAction {
    /// Whether the changeset's statements will run
    pub fn runs(self) -> bool {
        matches!(self, PlannedAction::Execute | PlannedAction::Rerun)
    }
}

/// A changeset paired with its planned action
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedChangeSet<'a> {
    pub change_set: &'a ChangeSet,
    pub action: PlannedAction,
}

/// Plan an update without touching the database
///
/// Changesets keep changelog order. An applied changeset whose stored checksum
/// differs from the current one is an error unless it is `runOnChange` or
/// `runAlways`. Rows without a stored checksum are treated as matching.
pub fn plan_update<'a>(
    change_sets: &'a [ChangeSet],
    ran: &[RanChangeSet],
    contexts: &TagFilter,
    labels: &TagFilter,
) -> Result<Vec<PlannedChangeSet<'a>>, ChangelogError> {
    let ran_by_key: HashMap<(&str, &str, &str), &RanChangeSet> = ran.iter().map(|r| (r.key(), r)).collect();

    change_sets
        .iter()
        .map(|change_set| {
            let action = plan_one(change_set, &ran_by_key, contexts, labels)?;
            Ok(PlannedChangeSet { change_set, action })
        })
        .collect()
}

fn plan_one(
    change_set: &ChangeSet,
    ran_by_key: &HashMap<(&str, &str, &str), &RanChangeSet>,
    contexts: &TagFilter,
    labels: &TagFilter,
) -> Result<PlannedAction, ChangelogError> {
    if !change_set.is_selected(contexts, labels) {
        return Ok(PlannedAction::Filtered);
    }

    let key = (
        change_set.id.as_str(),
        change_set.author.as_str(),
        change_set.file.as_str(),
    );
    let Some(ran) = ran_by_key.get(&key) else {
        return Ok(PlannedAction::Execute);
    };

    let unchanged = ran
        .checksum
        .as_deref()
        .map_or(true, |stored| stored == change_set.checksum);

    match (unchanged, change_set.run_always, change_set.run_on_change) {
        (_, true, _) => Ok(PlannedAction::Rerun),
        (true, false, _) => Ok(PlannedAction::AlreadyRan),
        (false, false, true) => Ok(PlannedAction::Rerun),
        (false, false, false) => Err(ChangelogError::ChecksumMismatch {
            id: change_set.id.clone(),
            author: change_set.author.clone(),
            file: change_set.file.clone(),
            stored: ran.checksum.clone().unwrap_or_default(),
            current: change_set.checksum.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changelog::ExecType;
    use chrono::Utc;

    fn change_set(id: &str, checksum: &str) -> ChangeSet {
        ChangeSet {
            id: id.to_string(),
            author: "dev".to_string(),
            file: "changelog.yaml".to_string(),
            changes: vec![],
            contexts: vec![],
            labels: vec![],
            run_always: false,
            run_on_change: false,
            fail_on_error: true,
            run_in_transaction: true,
            comment: None,
            checksum: checksum.to_string(),
        }
    }

    fn ran(id: &str, checksum: Option<&str>) -> RanChangeSet {
        RanChangeSet {
            id: id.to_string(),
            author: "dev".to_string(),
            filename: "changelog.yaml".to_string(),
            date_executed: Utc::now(),
            order_executed: 1,
            exec_type: ExecType::Executed,
            checksum: checksum.map(str::to_string),
            description: None,
            deployment_id: None,
        }
    }

    fn actions(plan: &[PlannedChangeSet<'_>]) -> Vec<PlannedAction> {
        plan.iter().map(|p| p.action).collect()
    }

    #[test]
    fn test_new_and_applied_change_sets() {
        let change_sets = vec![change_set("1", "sha256:a"), change_set("2", "sha256:b")];
        let plan = plan_update(&change_sets, &[ran("1", Some("sha256:a"))], &TagFilter::all(), &TagFilter::all()).unwrap();
        assert_eq!(actions(&plan), vec![PlannedAction::AlreadyRan, PlannedAction::Execute]);
    }

    #[test]
    fn test_modified_change_set_is_rejected() {
        let change_sets = vec![change_set("1", "sha256:new")];
        let err = plan_update(&change_sets, &[ran("1", Some("sha256:old"))], &TagFilter::all(), &TagFilter::all())
            .unwrap_err();
        match err {
            ChangelogError::ChecksumMismatch { stored, current, .. } => {
                assert_eq!(stored, "sha256:old");
                assert_eq!(current, "sha256:new");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_run_on_change_and_run_always() {
        let mut on_change = change_set("1", "sha256:new");
        on_change.run_on_change = true;
        let mut always = change_set("2", "sha256:same");
        always.run_always = true;
        let mut on_change_unchanged = change_set("3", "sha256:same");
        on_change_unchanged.run_on_change = true;

        let change_sets = vec![on_change, always, on_change_unchanged];
        let ran_rows = vec![
            ran("1", Some("sha256:old")),
            ran("2", Some("sha256:same")),
            ran("3", Some("sha256:same")),
        ];
        let plan = plan_update(&change_sets, &ran_rows, &TagFilter::all(), &TagFilter::all()).unwrap();
        assert_eq!(
            actions(&plan),
            vec![PlannedAction::Rerun, PlannedAction::Rerun, PlannedAction::AlreadyRan]
        );
    }

    #[test]
    fn test_missing_stored_checksum_matches() {
        let change_sets = vec![change_set("1", "sha256:a")];
        let plan = plan_update(&change_sets, &[ran("1", None)], &TagFilter::all(), &TagFilter::all()).unwrap();
        assert_eq!(actions(&plan), vec![PlannedAction::AlreadyRan]);
    }

    #[test]
    fn test_filtered_change_sets() {
        let mut dev_only = change_set("1", "sha256:a");
        dev_only.contexts = vec!["dev".to_string()];
        let change_sets = vec![dev_only];

        let plan = plan_update(&change_sets, &[], &TagFilter::new(["prod"]), &TagFilter::all()).unwrap();
        assert_eq!(actions(&plan), vec![PlannedAction::Filtered]);

        let plan = plan_update(&change_sets, &[], &TagFilter::new(["dev"]), &TagFilter::all()).unwrap();
        assert_eq!(actions(&plan), vec![PlannedAction::Execute]);
    }
}
