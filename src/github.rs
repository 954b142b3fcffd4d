//! Typed GitHub REST endpoints
//!
//! Thin wrappers over [`PagedFetcher`]: each method knows its path, query parameters and
//! pagination mode, and decodes only the fields the collector needs.

use crate::fetcher::{PageRequest, PagedFetcher};
use crate::error::FetchError;
use crate::types::RepositoryId;
use serde::Deserialize;

/// `/users/{login}`
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct UserProfile {
    /// Login as GitHub spells it
    pub login: String,
    /// Display name, often unset
    #[serde(default)]
    pub name: Option<String>,
    /// Avatar image URL
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Profile page URL
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Owner block of a repository
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct RepositoryOwner {
    /// Owner avatar image URL
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// `/repos/{owner}/{name}`
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct RepositoryInfo {
    /// `owner/name`
    pub full_name: String,
    /// Free-text description
    #[serde(default)]
    pub description: Option<String>,
    /// Repository page URL
    #[serde(default)]
    pub html_url: Option<String>,
    /// Owning account
    #[serde(default)]
    pub owner: Option<RepositoryOwner>,
}

/// Entry of `/repos/{owner}/{name}/contributors`
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Contributor {
    /// Absent for anonymous contributors
    #[serde(default)]
    pub login: Option<String>,
}

/// Account reference embedded in other payloads
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AccountRef {
    /// Login
    pub login: String,
}

/// Entry of `/repos/{owner}/{name}/pulls`
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct PullRequest {
    /// Author; null for deleted accounts
    #[serde(default)]
    pub user: Option<AccountRef>,
    /// RFC 3339 creation timestamp
    pub created_at: String,
}

/// Entry of `/repos/{owner}/{name}/commits`
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CommitSummary {
    /// Commit hash
    pub sha: String,
}

/// Item of `/search/issues`
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SearchIssue {
    /// API URL of the repository the issue or pull request belongs to
    pub repository_url: String,
}

/// GitHub REST client
#[derive(Clone, Debug)]
pub struct GitHubApi {
    fetcher: PagedFetcher,
    per_page: u32,
}

impl GitHubApi {
    /// Wrap a fetcher; `per_page` applies to every paginated listing
    pub fn new(fetcher: PagedFetcher, per_page: u32) -> Self {
        Self { fetcher, per_page }
    }

    /// Profile of one user
    pub async fn user(&self, login: &str) -> Result<UserProfile, FetchError> {
        self.fetcher
            .fetch_object(&format!("/users/{login}"), &[])
            .await
    }

    /// Metadata of one repository
    pub async fn repository(&self, repo: &RepositoryId) -> Result<RepositoryInfo, FetchError> {
        self.fetcher
            .fetch_object(&format!("/repos/{repo}"), &[])
            .await
    }

    /// Top contributors in GitHub's order, at most `max_pages` pages
    pub async fn contributors(
        &self,
        repo: &RepositoryId,
        max_pages: u32,
    ) -> Result<Vec<Contributor>, FetchError> {
        let request = PageRequest::new(format!("/repos/{repo}/contributors"))
            .per_page(self.per_page)
            .max_pages(max_pages);
        self.fetcher.fetch_all(&request).await
    }

    /// Every open pull request of a repository
    pub async fn open_pull_requests(
        &self,
        repo: &RepositoryId,
    ) -> Result<Vec<PullRequest>, FetchError> {
        let request = PageRequest::new(format!("/repos/{repo}/pulls"))
            .param("state", "open")
            .per_page(self.per_page);
        self.fetcher.fetch_all(&request).await
    }

    /// Commits authored by `author` since `since` (ISO-8601)
    pub async fn commits(
        &self,
        repo: &RepositoryId,
        author: &str,
        since: &str,
    ) -> Result<Vec<CommitSummary>, FetchError> {
        let request = PageRequest::new(format!("/repos/{repo}/commits"))
            .param("author", author)
            .param("since", since)
            .per_page(self.per_page);
        self.fetcher.fetch_all(&request).await
    }

    /// Pull requests authored by `author`, across all repositories
    pub async fn search_pull_requests(&self, author: &str) -> Result<Vec<SearchIssue>, FetchError> {
        let request = PageRequest::new("/search/issues")
            .param("q", format!("type:pr author:{author}"))
            .total_count()
            .per_page(self.per_page);
        self.fetcher.fetch_all(&request).await
    }
}
