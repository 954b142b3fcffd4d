//! Contribution collection
//!
//! The [`ContributionCollector`] walks the project map and turns GitHub API responses into
//! one [`ContributionRecord`] per (project, repository, user) triple:
//!
//! 1. one profile fetch per user
//! 2. per distinct repository: metadata, top contributors (rank map) and open pull
//!    requests (bucketed by author), then one commit listing per user
//! 3. one record per triple, zero counts included
//!
//! A repository listed under several projects is fetched once and reported under each of
//! them. The first fetch that fails after retries aborts the run with a
//! [`CollectionError`]; nothing partial is returned.

use crate::config::{CollectorConfig, ProjectMap, ReportInput};
use crate::error::{CollectionError, CollectionStage};
use crate::github::{GitHubApi, PullRequest, UserProfile};
use crate::types::{ContributionRecord, ContributorRank, RepositoryId, RepositoryMeta, UserMeta};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

type CollectResult<T> = std::result::Result<T, CollectionError>;

/// Everything fetched for one repository
#[derive(Clone, Debug)]
struct RepositoryActivity {
    meta: RepositoryMeta,
    ranks: HashMap<String, ContributorRank>,
    open_pull_requests: HashMap<String, u64>,
    /// Commit count per user, in input user order
    commits: Vec<u64>,
}

/// Builds raw contribution records from the GitHub API
#[derive(Clone, Debug)]
pub struct ContributionCollector {
    api: GitHubApi,
    config: CollectorConfig,
}

impl ContributionCollector {
    /// Create a collector
    pub fn new(api: GitHubApi, config: CollectorConfig) -> Self {
        Self { api, config }
    }

    /// Resolve projects, then collect every (project, repository, user) triple
    ///
    /// An empty resolution yields an empty record list.
    ///
    /// # Errors
    /// Returns the first fetch that failed after retries, tagged with stage and entity
    pub async fn collect(&self, input: &ReportInput) -> CollectResult<Vec<ContributionRecord>> {
        let projects = self.resolve_projects(input).await?;
        self.collect_projects(input, &projects).await
    }

    /// The explicit project map, or one discovered from the users' pull requests
    pub async fn resolve_projects(&self, input: &ReportInput) -> CollectResult<ProjectMap> {
        match &input.projects {
            Some(projects) => Ok(projects.clone()),
            None => self.discover_projects(&input.users).await,
        }
    }

    /// One project per repository any of `users` opened a pull request against
    ///
    /// The project key is the `owner/name` identifier.
    pub async fn discover_projects(&self, users: &[String]) -> CollectResult<ProjectMap> {
        let mut projects = ProjectMap::new();

        for user in users {
            info!(user = %user, "Discovering repositories from authored pull requests");
            let issues = self
                .api
                .search_pull_requests(user)
                .await
                .map_err(|e| CollectionError::new(CollectionStage::Discovery, user.as_str(), e))?;

            for issue in issues {
                match RepositoryId::from_api_url(&issue.repository_url) {
                    Some(repo) => {
                        projects
                            .entry(repo.to_string())
                            .or_insert_with(|| vec![repo]);
                    }
                    None => warn!(
                        url = %issue.repository_url,
                        "Skipping search result with unrecognized repository URL"
                    ),
                }
            }
        }

        info!(repositories = projects.len(), "Discovered repositories");
        Ok(projects)
    }

    /// Collect records for an already resolved project map
    ///
    /// # Errors
    /// Returns the first fetch that failed after retries, tagged with stage and entity
    pub async fn collect_projects(
        &self,
        input: &ReportInput,
        projects: &ProjectMap,
    ) -> CollectResult<Vec<ContributionRecord>> {
        let users = self.user_metadata(&input.users).await?;
        let start = input.start_datetime();
        let since = input.since_param();

        let mut activity: BTreeMap<RepositoryId, RepositoryActivity> = BTreeMap::new();
        let mut records = Vec::new();

        for (project, repos) in projects {
            info!(project = %project, repositories = repos.len(), "Collecting project");

            for repo in repos {
                if !activity.contains_key(repo) {
                    let fetched = self
                        .repository_activity(repo, &input.users, start, &since)
                        .await?;
                    activity.insert(repo.clone(), fetched);
                } else {
                    debug!(repository = %repo, "Reusing repository already collected");
                }
                let Some(repo_activity) = activity.get(repo) else {
                    continue;
                };

                for ((login, user_meta), commits) in
                    input.users.iter().zip(&users).zip(&repo_activity.commits)
                {
                    let open_pull_requests = repo_activity
                        .open_pull_requests
                        .get(login)
                        .copied()
                        .unwrap_or(0);
                    let rank = repo_activity
                        .ranks
                        .get(login)
                        .copied()
                        .unwrap_or_default();

                    debug!(
                        project = %project,
                        repository = %repo,
                        user = %login,
                        commits,
                        open_pull_requests,
                        rank = %rank,
                        "Built contribution record"
                    );

                    records.push(
                        ContributionRecord::new(
                            project.as_str(),
                            repo.to_string(),
                            login.as_str(),
                            *commits,
                            open_pull_requests,
                        )
                        .with_rank(rank)
                        .with_repository_meta(repo_activity.meta.clone())
                        .with_user_meta(user_meta.clone()),
                    );
                }
            }
        }

        info!(records = records.len(), "Collection complete");
        Ok(records)
    }

    /// Profile of every user, in input order
    async fn user_metadata(&self, users: &[String]) -> CollectResult<Vec<UserMeta>> {
        let mut metas = Vec::with_capacity(users.len());
        for login in users {
            let profile = self
                .api
                .user(login)
                .await
                .map_err(|e| CollectionError::new(CollectionStage::UserMetadata, login.as_str(), e))?;
            metas.push(user_meta(login, profile));
        }
        Ok(metas)
    }

    async fn repository_activity(
        &self,
        repo: &RepositoryId,
        users: &[String],
        start: DateTime<Utc>,
        since: &str,
    ) -> CollectResult<RepositoryActivity> {
        let entity = repo.to_string();
        info!(repository = %repo, "Collecting repository");

        let info = self.api.repository(repo).await.map_err(|e| {
            CollectionError::new(CollectionStage::RepositoryMetadata, entity.as_str(), e)
        })?;
        let meta = RepositoryMeta {
            display_name: if info.full_name.trim().is_empty() {
                entity.clone()
            } else {
                info.full_name
            },
            url: info.html_url,
            avatar_url: info.owner.and_then(|owner| owner.avatar_url),
            description: info.description,
        };

        let contributors = self
            .api
            .contributors(repo, self.config.contributor_page_limit)
            .await
            .map_err(|e| CollectionError::new(CollectionStage::Contributors, entity.as_str(), e))?;
        let mut ranks = HashMap::new();
        for (position, contributor) in contributors.iter().enumerate() {
            if let Some(login) = &contributor.login {
                let rank = ContributorRank::from_position(u32::try_from(position + 1).unwrap_or(u32::MAX));
                ranks.entry(login.to_lowercase()).or_insert(rank);
            }
        }

        let pulls = self
            .api
            .open_pull_requests(repo)
            .await
            .map_err(|e| CollectionError::new(CollectionStage::PullRequests, entity.as_str(), e))?;
        let open_pull_requests = bucket_pull_requests(&pulls, start);

        debug!(
            repository = %repo,
            contributors = contributors.len(),
            open_pull_requests = pulls.len(),
            "Fetched repository listings"
        );

        let commits = self.commit_counts(repo, users, since).await?;

        Ok(RepositoryActivity {
            meta,
            ranks,
            open_pull_requests,
            commits,
        })
    }

    /// Commit counts per user, at most `max_concurrent_requests` listings in flight
    async fn commit_counts(
        &self,
        repo: &RepositoryId,
        users: &[String],
        since: &str,
    ) -> CollectResult<Vec<u64>> {
        let concurrency = self.config.max_concurrent_requests.max(1);

        stream::iter(users)
            .map(|user| async move {
                self.api
                    .commits(repo, user, since)
                    .await
                    .map(|commits| commits.len() as u64)
                    .map_err(|e| {
                        CollectionError::new(CollectionStage::Commits, format!("{repo} ({user})"), e)
                    })
            })
            .buffered(concurrency)
            .try_collect()
            .await
    }
}

fn user_meta(login: &str, profile: UserProfile) -> UserMeta {
    let display_name = profile
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| login.to_string());
    UserMeta {
        display_name,
        url: profile.html_url,
        avatar_url: profile.avatar_url,
    }
}

/// Count open pull requests created on or after `start`, keyed by lower-cased author login
pub fn bucket_pull_requests(pulls: &[PullRequest], start: DateTime<Utc>) -> HashMap<String, u64> {
    let mut buckets = HashMap::new();
    for pull in pulls {
        let Some(author) = &pull.user else {
            continue;
        };
        if created_on_or_after(&pull.created_at, start) {
            *buckets
                .entry(author.login.trim().to_lowercase())
                .or_insert(0) += 1;
        }
    }
    buckets
}

/// Whether an RFC 3339 `created_at` falls on or after `start`
///
/// Timestamps that do not parse are compared as text against the `YYYY-MM-DD` start date.
pub fn created_on_or_after(created_at: &str, start: DateTime<Utc>) -> bool {
    match DateTime::parse_from_rfc3339(created_at) {
        Ok(created) => created.with_timezone(&Utc) >= start,
        Err(e) => {
            let start_date = start.format("%Y-%m-%d").to_string();
            debug!(
                created_at,
                error = %e,
                "Unparseable pull request timestamp, comparing as text"
            );
            created_at >= start_date.as_str()
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
