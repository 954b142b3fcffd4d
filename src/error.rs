//! Error types for contrib-report
//!
//! This module provides the error taxonomy for the library:
//! - [`FetchError`] for a single HTTP request that failed (network, status, decode)
//! - [`CollectionError`] for the first unrecoverable fetch during a collection run
//! - [`Error`] as the top-level type returned by the pipeline and report writers

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for contrib-report operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for contrib-report
///
/// Each variant carries enough context to diagnose a failed run without re-running it.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "start_date")
        key: Option<String>,
    },

    /// Collection aborted on an unrecoverable fetch
    #[error("collection error: {0}")]
    Collection(#[from] CollectionError),

    /// Collected or loaded data has an unexpected shape
    #[error("aggregation error: {0}")]
    Aggregation(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot read/write error
    #[error("snapshot error: {0}")]
    Snapshot(#[from] csv::Error),

    /// Chart rendering failed
    #[error("chart error: {0}")]
    Chart(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Why a single request failed
#[derive(Debug, Error)]
pub enum FetchCause {
    /// Connection, TLS, timeout or body transfer failure
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        /// Response status code
        status: u16,
        /// Truncated response body, useful for GitHub's error messages
        body: String,
        /// Delay requested by the server via `Retry-After`
        retry_after: Option<Duration>,
    },

    /// Response body did not match the expected shape
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A request that failed on a given attempt
///
/// Returned by the fetcher once the retry ceiling is reached (or immediately for
/// permanent failures); `attempt` is the 1-based number of the last attempt made.
#[derive(Debug, Error)]
#[error("GET {endpoint} failed on attempt {attempt}: {cause}")]
pub struct FetchError {
    /// Endpoint path (without base URL), including the page number when paginating
    pub endpoint: String,
    /// 1-based attempt number that produced this error
    pub attempt: u32,
    /// Underlying cause
    #[source]
    pub cause: FetchCause,
}

impl FetchError {
    /// Create a new fetch error
    pub fn new(endpoint: impl Into<String>, attempt: u32, cause: impl Into<FetchCause>) -> Self {
        Self {
            endpoint: endpoint.into(),
            attempt,
            cause: cause.into(),
        }
    }

    /// HTTP status code, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match &self.cause {
            FetchCause::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server-requested delay before the next attempt
    pub fn retry_after(&self) -> Option<Duration> {
        match &self.cause {
            FetchCause::HttpStatus { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Step of the collection run during which a fetch failed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectionStage {
    /// `/users/{login}` lookup
    UserMetadata,
    /// `/repos/{owner}/{name}` lookup
    RepositoryMetadata,
    /// Top contributor listing
    Contributors,
    /// Open pull request listing
    PullRequests,
    /// Commit listing for one user
    Commits,
    /// Pull request search used to discover repositories
    Discovery,
}

impl fmt::Display for CollectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            CollectionStage::UserMetadata => "user metadata",
            CollectionStage::RepositoryMetadata => "repository metadata",
            CollectionStage::Contributors => "contributors",
            CollectionStage::PullRequests => "open pull requests",
            CollectionStage::Commits => "commits",
            CollectionStage::Discovery => "repository discovery",
        };
        f.write_str(stage)
    }
}

/// The first unrecoverable fetch of a collection run
#[derive(Debug, Error)]
#[error("failed to fetch {stage} for {entity}: {source}")]
pub struct CollectionError {
    /// What was being collected
    pub stage: CollectionStage,
    /// The user, repository or (repository, user) pair being processed
    pub entity: String,
    /// The fetch that failed
    #[source]
    pub source: FetchError,
}

impl CollectionError {
    /// Wrap a fetch error with the stage and entity being processed
    pub fn new(stage: CollectionStage, entity: impl Into<String>, source: FetchError) -> Self {
        Self {
            stage,
            entity: entity.into(),
            source,
        }
    }
}
