//! Aggregation of raw contribution records
//!
//! Three views are derived from one record list:
//! - the filtered table (records with at least one commit or open pull request)
//! - one [`UserRollup`] per login
//! - one [`ProjectRollup`] per project key
//!
//! Rollups are rebuilt from scratch on every call and ordered by their grouping key.
//! Linked repository and user listings are `BTreeSet`s, so they come out deduplicated and
//! sorted by display name.

use crate::types::{AggregatedReport, ContributionRecord, EntityRef, ProjectRollup, Totals, UserRollup};
use std::collections::{BTreeMap, BTreeSet};

/// Keep records with a non-zero contribution, in input order
///
/// Idempotent: filtering an already filtered list returns it unchanged.
pub fn filter_contributions(records: Vec<ContributionRecord>) -> Vec<ContributionRecord> {
    records
        .into_iter()
        .filter(ContributionRecord::has_contribution)
        .collect()
}

#[derive(Default)]
struct Group {
    profile: Option<EntityRef>,
    totals: Totals,
    repository_ids: BTreeSet<String>,
    repositories: BTreeSet<EntityRef>,
    users: BTreeSet<EntityRef>,
}

impl Group {
    fn add(&mut self, record: &ContributionRecord) {
        self.totals.add(record);
        if record.has_contribution() {
            self.repository_ids.insert(record.repository().to_string());
            self.repositories.insert(record.repository_ref());
            self.users.insert(record.user_ref());
        }
    }
}

/// One row per user with a non-zero total, ordered by login
///
/// When records disagree on a user's display metadata the first one wins.
pub fn rollup_by_user(records: &[ContributionRecord]) -> Vec<UserRollup> {
    let mut groups: BTreeMap<&str, Group> = BTreeMap::new();
    for record in records {
        let group = groups.entry(record.user()).or_default();
        if group.profile.is_none() {
            group.profile = Some(record.user_ref());
        }
        group.add(record);
    }

    groups
        .into_iter()
        .filter(|(_, group)| group.totals.overall() > 0)
        .map(|(user, group)| UserRollup {
            user: user.to_string(),
            profile: group.profile.unwrap_or_else(|| EntityRef {
                name: user.to_string(),
                url: None,
                avatar_url: None,
            }),
            totals: group.totals,
            repository_count: group.repository_ids.len(),
            repositories: group.repositories,
        })
        .collect()
}

/// One row per project with a non-zero total, ordered by project key
pub fn rollup_by_project(records: &[ContributionRecord]) -> Vec<ProjectRollup> {
    let mut groups: BTreeMap<&str, Group> = BTreeMap::new();
    for record in records {
        groups.entry(record.project()).or_default().add(record);
    }

    groups
        .into_iter()
        .filter(|(_, group)| group.totals.overall() > 0)
        .map(|(project, group)| ProjectRollup {
            project: project.to_string(),
            totals: group.totals,
            repository_count: group.repository_ids.len(),
            repositories: group.repositories,
            users: group.users,
        })
        .collect()
}

/// Filter the records and build both rollups
pub fn aggregate(records: Vec<ContributionRecord>) -> AggregatedReport {
    let records = filter_contributions(records);
    let users = rollup_by_user(&records);
    let projects = rollup_by_project(&records);

    tracing::info!(
        records = records.len(),
        users = users.len(),
        projects = projects.len(),
        "Aggregated contributions"
    );

    AggregatedReport {
        records,
        users,
        projects,
    }
}
