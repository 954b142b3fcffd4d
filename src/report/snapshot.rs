//! CSV snapshot of contribution records
//!
//! The snapshot is the flat record table with a header row. It can be fed back in place of
//! a live collection to re-render a report.

use crate::error::{Error, Result};
use crate::types::{ContributionRecord, ContributorRank, RepositoryMeta, UserMeta};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One snapshot row
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRow {
    /// Project key
    #[serde(rename = "Project Key")]
    pub project: String,
    /// `owner/name`
    #[serde(rename = "Repository")]
    pub repository: String,
    /// Repository display name
    #[serde(rename = "Repository Name")]
    pub repository_name: String,
    /// Repository page
    #[serde(rename = "Repository URL")]
    pub repository_url: Option<String>,
    /// Repository description
    #[serde(rename = "Repository Description")]
    pub repository_description: Option<String>,
    /// Owner avatar
    #[serde(rename = "Repository Avatar")]
    pub repository_avatar: Option<String>,
    /// Login
    #[serde(rename = "User")]
    pub user: String,
    /// User display name
    #[serde(rename = "User Name")]
    pub user_name: String,
    /// Profile page
    #[serde(rename = "User URL")]
    pub user_url: Option<String>,
    /// User avatar
    #[serde(rename = "User Avatar")]
    pub user_avatar: Option<String>,
    /// Commit count
    #[serde(rename = "Commits")]
    pub commits: u64,
    /// Open pull request count
    #[serde(rename = "Pull Requests (Open)")]
    pub open_pull_requests: u64,
    /// Contributor rank, -1 when unranked
    #[serde(rename = "Rank")]
    pub rank: i64,
    /// Commits plus open pull requests
    #[serde(rename = "Overall Contribution")]
    pub overall: u64,
}

impl From<&ContributionRecord> for RecordRow {
    fn from(record: &ContributionRecord) -> Self {
        let repo = record.repository_meta();
        let user = record.user_meta();
        Self {
            project: record.project().to_string(),
            repository: record.repository().to_string(),
            repository_name: repo.display_name.clone(),
            repository_url: repo.url.clone(),
            repository_description: repo.description.clone(),
            repository_avatar: repo.avatar_url.clone(),
            user: record.user().to_string(),
            user_name: user.display_name.clone(),
            user_url: user.url.clone(),
            user_avatar: user.avatar_url.clone(),
            commits: record.commit_count(),
            open_pull_requests: record.open_pull_request_count(),
            rank: record.rank().to_i64(),
            overall: record.overall_contribution(),
        }
    }
}

impl TryFrom<RecordRow> for ContributionRecord {
    type Error = String;

    fn try_from(row: RecordRow) -> std::result::Result<Self, Self::Error> {
        let sum = row.commits.checked_add(row.open_pull_requests).ok_or_else(|| {
            format!(
                "commits {} + open pull requests {} overflows",
                row.commits, row.open_pull_requests
            )
        })?;
        if sum != row.overall {
            return Err(format!(
                "overall contribution {} is not commits {} + open pull requests {}",
                row.overall, row.commits, row.open_pull_requests
            ));
        }
        let rank = ContributorRank::from_i64(row.rank)
            .ok_or_else(|| format!("rank {} is neither -1 nor positive", row.rank))?;

        let repository_name = non_empty_or(row.repository_name, &row.repository);
        let user_name = non_empty_or(row.user_name, &row.user);

        Ok(ContributionRecord::new(
            row.project,
            row.repository,
            row.user,
            row.commits,
            row.open_pull_requests,
        )
        .with_rank(rank)
        .with_repository_meta(RepositoryMeta {
            display_name: repository_name,
            url: row.repository_url,
            avatar_url: row.repository_avatar,
            description: row.repository_description,
        })
        .with_user_meta(UserMeta {
            display_name: user_name,
            url: row.user_url,
            avatar_url: row.user_avatar,
        }))
    }
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

/// Snapshot column names, in order
pub const COLUMNS: [&str; 14] = [
    "Project Key",
    "Repository",
    "Repository Name",
    "Repository URL",
    "Repository Description",
    "Repository Avatar",
    "User",
    "User Name",
    "User URL",
    "User Avatar",
    "Commits",
    "Pull Requests (Open)",
    "Rank",
    "Overall Contribution",
];

/// Write records to `path`, replacing any existing file
///
/// The header row is written even when there are no records.
pub fn write_snapshot(path: &Path, records: &[ContributionRecord]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(COLUMNS)?;
    for record in records {
        writer.serialize(RecordRow::from(record))?;
    }
    writer.flush()?;
    tracing::info!(path = %path.display(), rows = records.len(), "Wrote snapshot");
    Ok(())
}

/// Read records back from a snapshot
///
/// # Errors
/// [`Error::Snapshot`] for unreadable or malformed CSV, [`Error::Aggregation`] for rows whose
/// counts or rank are inconsistent
pub fn read_snapshot(path: &Path) -> Result<Vec<ContributionRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();

    for (index, row) in reader.deserialize::<RecordRow>().enumerate() {
        let row = row?;
        // header is line 1
        let line = index + 2;
        let record = ContributionRecord::try_from(row)
            .map_err(|e| Error::Aggregation(format!("{}:{line}: {e}", path.display())))?;
        records.push(record);
    }

    tracing::info!(path = %path.display(), rows = records.len(), "Read snapshot");
    Ok(records)
}
