//! Core types for contrib-report

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

/// Repository identifier in `owner/name` form
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepositoryId {
    owner: String,
    name: String,
}

impl RepositoryId {
    /// Create a repository identifier from its two components
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Owning user or organization
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Repository name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Derive the identifier from an API `repository_url`,
    /// e.g. `https://api.github.com/repos/rust-lang/rust`
    pub fn from_api_url(url: &str) -> Option<Self> {
        let mut segments = url.trim_end_matches('/').rsplit('/');
        let name = segments.next()?;
        let owner = segments.next()?;
        if owner.is_empty() || name.is_empty() || owner.contains(':') {
            return None;
        }
        Some(Self::new(owner, name))
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepositoryId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(owner, name))
            }
            _ => Err(format!(
                "repository '{trimmed}' is not in owner/name form"
            )),
        }
    }
}

impl TryFrom<String> for RepositoryId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RepositoryId> for String {
    fn from(id: RepositoryId) -> Self {
        id.to_string()
    }
}

/// Position of a user in a repository's top-contributor listing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContributorRank {
    /// 1-based rank among the top contributors
    Ranked(NonZeroU32),
    /// Not among the fetched top contributors
    #[default]
    Unranked,
}

impl ContributorRank {
    /// Rank from a 1-based position; zero means unranked
    pub fn from_position(position: u32) -> Self {
        NonZeroU32::new(position).map_or(Self::Unranked, Self::Ranked)
    }

    /// Snapshot encoding: the rank, or -1 when unranked
    pub fn to_i64(self) -> i64 {
        match self {
            Self::Ranked(rank) => i64::from(rank.get()),
            Self::Unranked => -1,
        }
    }

    /// Decode the snapshot encoding; anything that is not -1 or a positive rank is rejected
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            -1 => Some(Self::Unranked),
            v if v > 0 => u32::try_from(v).ok().map(Self::from_position),
            _ => None,
        }
    }
}

impl fmt::Display for ContributorRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ranked(rank) => write!(f, "#{rank}"),
            Self::Unranked => f.write_str("unranked"),
        }
    }
}

/// Repository display metadata
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryMeta {
    /// Display name (the API's `full_name`)
    pub display_name: String,
    /// Web URL
    pub url: Option<String>,
    /// Owner avatar URL
    pub avatar_url: Option<String>,
    /// Repository description
    pub description: Option<String>,
}

/// User display metadata
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMeta {
    /// Display name, the login when the profile has no name
    pub display_name: String,
    /// Profile URL
    pub url: Option<String>,
    /// Avatar URL
    pub avatar_url: Option<String>,
}

/// One contribution fact for a (project, repository, user) triple
///
/// Immutable once built; `overall_contribution` is always the sum of the two counts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContributionRecord {
    project: String,
    repository: String,
    user: String,
    commit_count: u64,
    open_pull_request_count: u64,
    rank: ContributorRank,
    repository_meta: RepositoryMeta,
    user_meta: UserMeta,
}

impl ContributionRecord {
    /// Build a record
    ///
    /// `repository` is the `owner/name` identifier and `user` the lower-cased login.
    pub fn new(
        project: impl Into<String>,
        repository: impl Into<String>,
        user: impl Into<String>,
        commit_count: u64,
        open_pull_request_count: u64,
    ) -> Self {
        let repository = repository.into();
        let user = user.into();
        Self {
            project: project.into(),
            repository_meta: RepositoryMeta {
                display_name: repository.clone(),
                ..RepositoryMeta::default()
            },
            user_meta: UserMeta {
                display_name: user.clone(),
                ..UserMeta::default()
            },
            repository,
            user,
            commit_count,
            open_pull_request_count,
            rank: ContributorRank::Unranked,
        }
    }

    /// Attach a contributor rank
    #[must_use]
    pub fn with_rank(mut self, rank: ContributorRank) -> Self {
        self.rank = rank;
        self
    }

    /// Attach repository metadata
    #[must_use]
    pub fn with_repository_meta(mut self, meta: RepositoryMeta) -> Self {
        self.repository_meta = meta;
        self
    }

    /// Attach user metadata
    #[must_use]
    pub fn with_user_meta(mut self, meta: UserMeta) -> Self {
        self.user_meta = meta;
        self
    }

    /// Project key
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Repository identifier (`owner/name`)
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// User login
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Commits authored since the start date
    pub fn commit_count(&self) -> u64 {
        self.commit_count
    }

    /// Open pull requests created since the start date
    pub fn open_pull_request_count(&self) -> u64 {
        self.open_pull_request_count
    }

    /// Commits plus open pull requests
    pub fn overall_contribution(&self) -> u64 {
        self.commit_count + self.open_pull_request_count
    }

    /// Contributor rank in the repository
    pub fn rank(&self) -> ContributorRank {
        self.rank
    }

    /// Repository metadata
    pub fn repository_meta(&self) -> &RepositoryMeta {
        &self.repository_meta
    }

    /// User metadata
    pub fn user_meta(&self) -> &UserMeta {
        &self.user_meta
    }

    /// True when the record has at least one commit or open pull request
    pub fn has_contribution(&self) -> bool {
        self.commit_count > 0 || self.open_pull_request_count > 0
    }

    /// Linked reference to the repository for rollup listings
    pub fn repository_ref(&self) -> EntityRef {
        EntityRef {
            name: self.repository_meta.display_name.clone(),
            url: self.repository_meta.url.clone(),
            avatar_url: self.repository_meta.avatar_url.clone(),
        }
    }

    /// Linked reference to the user for rollup listings
    pub fn user_ref(&self) -> EntityRef {
        EntityRef {
            name: self.user_meta.display_name.clone(),
            url: self.user_meta.url.clone(),
            avatar_url: self.user_meta.avatar_url.clone(),
        }
    }
}

/// (name, URL, avatar) tuple listed in a rollup
///
/// Ordered by name first, so a `BTreeSet<EntityRef>` is both deduplicated and sorted by
/// display name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// Display name
    pub name: String,
    /// Web URL
    pub url: Option<String>,
    /// Avatar URL
    pub avatar_url: Option<String>,
}

/// Contribution totals shared by both rollups
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    /// Summed commits
    pub commits: u64,
    /// Summed open pull requests
    pub open_pull_requests: u64,
}

impl Totals {
    /// Commits plus open pull requests
    pub fn overall(&self) -> u64 {
        self.commits + self.open_pull_requests
    }

    /// Add one record's counts
    pub fn add(&mut self, record: &ContributionRecord) {
        self.commits += record.commit_count();
        self.open_pull_requests += record.open_pull_request_count();
    }
}

/// One row per user with a non-zero contribution
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserRollup {
    /// User login
    pub user: String,
    /// Display name, URL and avatar of the user
    pub profile: EntityRef,
    /// Summed counts
    pub totals: Totals,
    /// Repositories the user contributed to
    pub repositories: BTreeSet<EntityRef>,
    /// Number of distinct repository identifiers
    pub repository_count: usize,
}

/// One row per project with a non-zero contribution
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectRollup {
    /// Project key
    pub project: String,
    /// Summed counts
    pub totals: Totals,
    /// Repositories of the project that received contributions
    pub repositories: BTreeSet<EntityRef>,
    /// Number of distinct repository identifiers
    pub repository_count: usize,
    /// Users who contributed to the project
    pub users: BTreeSet<EntityRef>,
}

/// The three views produced by the aggregator
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AggregatedReport {
    /// Records with at least one contribution, in input order
    pub records: Vec<ContributionRecord>,
    /// Per-user rollup, ordered by login
    pub users: Vec<UserRollup>,
    /// Per-project rollup, ordered by project key
    pub projects: Vec<ProjectRollup>,
}
