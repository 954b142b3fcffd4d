//! Proportional buckets for the contribution charts
//!
//! Small groups can be folded into a single "Other" bucket: with a threshold of `p` percent,
//! every group whose contribution is strictly below `p%` of the largest group is relabeled.

use crate::types::{ProjectRollup, UserRollup};
use std::collections::BTreeMap;

/// Label of the synthetic bucket that collects small groups
pub const OTHER_LABEL: &str = "Other";

/// One chart slice
#[derive(Clone, Debug, PartialEq)]
pub struct Bucket {
    /// Group label
    pub label: String,
    /// Contribution of the group
    pub value: u64,
    /// Share of the total, 0-100
    pub percent: f64,
}

/// Fold, sort and weigh `(label, contribution)` groups
///
/// - `threshold` of `Some(p)` with `p >= 0`: groups strictly below `max * p / 100` become
///   [`OTHER_LABEL`]; a real group already called "Other" merges into the same bucket.
/// - `None` or a negative `p`: groups are kept as they are (equal labels still merge).
///
/// Buckets are sorted by value descending, ties by label ascending.
pub fn summarize<I, S>(groups: I, threshold: Option<f64>) -> Vec<Bucket>
where
    I: IntoIterator<Item = (S, u64)>,
    S: Into<String>,
{
    let groups: Vec<(String, u64)> = groups
        .into_iter()
        .map(|(label, value)| (label.into(), value))
        .collect();

    let cutoff = threshold.filter(|p| *p >= 0.0).map(|p| {
        let max = groups.iter().map(|(_, v)| *v).max().unwrap_or(0);
        max as f64 * p / 100.0
    });

    let mut merged: BTreeMap<String, u64> = BTreeMap::new();
    for (label, value) in groups {
        let label = match cutoff {
            Some(cutoff) if (value as f64) < cutoff => OTHER_LABEL.to_string(),
            _ => label,
        };
        *merged.entry(label).or_insert(0) += value;
    }

    let total: u64 = merged.values().sum();
    let mut buckets: Vec<Bucket> = merged
        .into_iter()
        .map(|(label, value)| Bucket {
            percent: if total == 0 {
                0.0
            } else {
                value as f64 * 100.0 / total as f64
            },
            label,
            value,
        })
        .collect();

    // BTreeMap order already has labels ascending; a stable sort keeps it for ties
    buckets.sort_by(|a, b| b.value.cmp(&a.value));
    buckets
}

/// Sum of all bucket values
pub fn total(buckets: &[Bucket]) -> u64 {
    buckets.iter().map(|b| b.value).sum()
}

/// Per-user buckets labeled with display names
pub fn user_buckets(users: &[UserRollup], threshold: Option<f64>) -> Vec<Bucket> {
    summarize(
        users
            .iter()
            .map(|u| (u.profile.name.clone(), u.totals.overall())),
        threshold,
    )
}

/// Per-project buckets labeled with project keys
pub fn project_buckets(projects: &[ProjectRollup], threshold: Option<f64>) -> Vec<Bucket> {
    summarize(
        projects
            .iter()
            .map(|p| (p.project.clone(), p.totals.overall())),
        threshold,
    )
}
