//! Configuration types for contrib-report
//!
//! Two kinds of configuration live here:
//! - [`Config`]: tuning for the HTTP client, retries, pacing, collection and report output.
//!   Every field has a default, so an empty (or absent) settings file is valid.
//! - [`InputConfig`]: the user-facing input file naming the start date, the users and the
//!   project → repository mapping. It is validated into a [`ReportInput`] before any
//!   network call is made.

use crate::error::{Error, Result};
use crate::fetcher::MAX_PER_PAGE;
use crate::types::RepositoryId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default GitHub REST API endpoint
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Expected layout of the input file, shown alongside configuration errors
pub const INPUT_FORMAT_HINT: &str = r#"{
    "start_date": "YYYY-MM-DD",
    "users": ["user1", "user2"],
    "project_to_repo_dict": {
        "Project 1": ["owner1/repo1", "owner1/repo2"],
        "Project 2": ["owner2/repo3"]
    }
}
NOTE: 'project_to_repo_dict' is optional. Without it, repositories are discovered from
the pull requests each user has authored."#;

/// HTTP client configuration
///
/// Replaces ambient process state (global headers, proxy dictionaries) with an explicit
/// value handed to the fetcher at construction.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API base URL (default: https://api.github.com)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token sent as `Authorization: Bearer <token>`
    #[serde(default, skip_serializing)]
    pub token: Option<String>,

    /// Proxy for plain HTTP requests
    #[serde(default)]
    pub http_proxy: Option<String>,

    /// Proxy for HTTPS requests
    #[serde(default)]
    pub https_proxy: Option<String>,

    /// Skip TLS certificate verification (default: false)
    ///
    /// Only meant for intercepting corporate proxies with self-signed certificates.
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_ms_serde")]
    pub request_timeout: Duration,

    /// User-Agent header (GitHub rejects requests without one)
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            http_proxy: None,
            https_proxy: None,
            accept_invalid_certs: false,
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("http_proxy", &self.http_proxy)
            .field("https_proxy", &self.https_proxy)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("request_timeout", &self.request_timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl ClientConfig {
    /// Build a client configuration from defaults plus environment variables
    ///
    /// See [`ClientConfig::apply_env`] for the variables consulted.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from environment variables that are set and non-empty
    ///
    /// - `GITHUB_TOKEN` - bearer credential
    /// - `GITHUB_API_URL` - API base URL
    /// - `HTTP_PROXY` / `HTTPS_PROXY` - proxy URLs
    /// - `CONTRIB_REPORT_INSECURE_TLS` - `1`/`true` disables certificate verification
    pub fn apply_env(&mut self) {
        if let Some(token) = env_var("GITHUB_TOKEN") {
            self.token = Some(token);
        }
        if let Some(url) = env_var("GITHUB_API_URL") {
            self.base_url = url;
        }
        if let Some(proxy) = env_var("HTTP_PROXY") {
            self.http_proxy = Some(proxy);
        }
        if let Some(proxy) = env_var("HTTPS_PROXY") {
            self.https_proxy = Some(proxy);
        }
        if let Some(flag) = env_var("CONTRIB_REPORT_INSECURE_TLS") {
            self.accept_invalid_certs = matches!(flag.to_ascii_lowercase().as_str(), "1" | "true");
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Retry configuration for transient request failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts per request, including the first (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay after the first failed attempt (default: 300 ms)
    #[serde(default = "default_initial_delay", with = "duration_ms_serde")]
    pub initial_delay: Duration,

    /// Upper bound for any single backoff delay (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_ms_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

/// Global request pacing
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Minimum spacing between consecutive request starts (default: 1 second, i.e. at most
    /// 60 requests per minute). Zero disables pacing.
    #[serde(default = "default_min_interval", with = "duration_ms_serde")]
    pub min_interval: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_interval: default_min_interval(),
        }
    }
}

/// Collection behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Page size for every paginated listing (default: 100, the GitHub maximum)
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Pages of top contributors to fetch per repository (default: 5, i.e. top 500)
    #[serde(default = "default_contributor_page_limit")]
    pub contributor_page_limit: u32,

    /// Commit listings fetched concurrently per repository (default: 1, sequential)
    ///
    /// Pacing stays global regardless of this value.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            per_page: default_per_page(),
            contributor_page_limit: default_contributor_page_limit(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

/// Report output
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Output directory (default: "output")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Markdown report file name (default: "github_contributions_report.md")
    #[serde(default = "default_report_file_name")]
    pub report_file_name: String,

    /// Snapshot file name (default: "github_contribution_data.csv")
    #[serde(default = "default_snapshot_file_name")]
    pub snapshot_file_name: String,

    /// Percentage of the largest user contribution below which users are merged into
    /// "Other" on the user chart (default: None, no merging)
    #[serde(default)]
    pub other_threshold: Option<f64>,

    /// Write the filtered records as a CSV snapshot (default: true)
    #[serde(default = "default_true")]
    pub dump_snapshot: bool,

    /// Chart width in pixels (default: 1000)
    #[serde(default = "default_chart_width")]
    pub chart_width: u32,

    /// Chart height in pixels (default: 800)
    #[serde(default = "default_chart_height")]
    pub chart_height: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            report_file_name: default_report_file_name(),
            snapshot_file_name: default_snapshot_file_name(),
            other_threshold: None,
            dump_snapshot: true,
            chart_width: default_chart_width(),
            chart_height: default_chart_height(),
        }
    }
}

impl ReportConfig {
    /// Full path of the Markdown report
    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(&self.report_file_name)
    }

    /// Full path of the CSV snapshot
    pub fn snapshot_path(&self) -> PathBuf {
        self.output_dir.join(&self.snapshot_file_name)
    }
}

/// Main configuration
///
/// Grouped into sub-configs; every section is optional in the settings file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP client settings
    #[serde(default)]
    pub client: ClientConfig,

    /// Retry behavior
    #[serde(default)]
    pub retry: RetryConfig,

    /// Global request pacing
    #[serde(default)]
    pub pacing: PacingConfig,

    /// Collection behavior
    #[serde(default)]
    pub collector: CollectorConfig,

    /// Report output
    #[serde(default)]
    pub report: ReportConfig,
}

impl Config {
    /// Load settings from a JSON file
    ///
    /// # Errors
    /// Returns a configuration error if the file cannot be read or parsed
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config("settings", format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            Error::config("settings", format!("invalid settings in {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the API would silently reinterpret
    ///
    /// # Errors
    /// Returns a configuration error if `collector.per_page` is outside `1..=100`
    pub fn validate(&self) -> Result<()> {
        let per_page = self.collector.per_page;
        if !(1..=MAX_PER_PAGE).contains(&per_page) {
            return Err(Error::config(
                "collector.per_page",
                format!("page size {per_page} is outside 1..={MAX_PER_PAGE}"),
            ));
        }
        Ok(())
    }
}

/// Project key → repositories
pub type ProjectMap = BTreeMap<String, Vec<RepositoryId>>;

/// Raw input file, exactly as the user writes it
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InputConfig {
    /// Start of the tracked window, "YYYY-MM-DD"
    #[serde(default)]
    pub start_date: Option<String>,

    /// GitHub logins to track
    #[serde(default)]
    pub users: Vec<String>,

    /// Project key → list of "owner/name" repositories
    #[serde(default)]
    pub project_to_repo_dict: Option<BTreeMap<String, Vec<String>>>,
}

impl InputConfig {
    /// Read the input file
    ///
    /// # Errors
    /// Returns a configuration error if the file is missing or is not valid JSON
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config("input", format!("cannot read {}: {e}", path.display()))
        })?;
        let input: Self = serde_json::from_str(&raw).map_err(|e| {
            Error::config("input", format!("invalid JSON in {}: {e}", path.display()))
        })?;
        tracing::info!(path = %path.display(), "Read input file");
        Ok(input)
    }

    /// Validate and normalize into a [`ReportInput`]
    ///
    /// - `start_date` must be present and a valid `YYYY-MM-DD` date
    /// - users are trimmed, lower-cased and deduplicated; at least one must remain
    /// - every repository must have the `owner/name` form
    /// - an absent or empty project map means repositories are discovered later
    ///
    /// # Errors
    /// Returns [`Error::Config`] naming the offending key
    pub fn validate(self) -> Result<ReportInput> {
        let raw_date = self
            .start_date
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| Error::config("start_date", "start date is required"))?;
        let start_date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|e| {
            Error::config(
                "start_date",
                format!("start date '{raw_date}' is not YYYY-MM-DD: {e}"),
            )
        })?;

        let mut users: Vec<String> = Vec::with_capacity(self.users.len());
        for user in self.users {
            let user = user.trim().to_lowercase();
            if !user.is_empty() && !users.contains(&user) {
                users.push(user);
            }
        }
        if users.is_empty() {
            return Err(Error::config("users", "at least one user is required"));
        }

        let projects = match self.project_to_repo_dict {
            Some(dict) if !dict.is_empty() => {
                let mut projects = ProjectMap::new();
                for (project, repos) in dict {
                    let parsed = repos
                        .iter()
                        .map(|repo| {
                            repo.parse::<RepositoryId>().map_err(|e| {
                                Error::config(
                                    "project_to_repo_dict",
                                    format!("project '{project}': {e}"),
                                )
                            })
                        })
                        .collect::<Result<Vec<_>>>()?;
                    projects.insert(project, parsed);
                }
                if projects.values().all(Vec::is_empty) {
                    return Err(Error::config(
                        "project_to_repo_dict",
                        "at least one project with repositories is required",
                    ));
                }
                Some(projects)
            }
            _ => None,
        };

        Ok(ReportInput {
            start_date,
            users,
            projects,
        })
    }
}

/// Validated input for a collection run
#[derive(Clone, Debug, PartialEq)]
pub struct ReportInput {
    /// First day of the tracked window
    pub start_date: NaiveDate,
    /// Normalized (trimmed, lower-cased, unique) logins
    pub users: Vec<String>,
    /// Explicit project map; `None` triggers repository discovery
    pub projects: Option<ProjectMap>,
}

impl ReportInput {
    /// Start of the window at 00:00:00 UTC
    pub fn start_datetime(&self) -> DateTime<Utc> {
        self.start_date.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    /// Start of the window as the ISO-8601 `since` parameter, e.g. `2024-01-01T00:00:00Z`
    pub fn since_param(&self) -> String {
        self.start_datetime()
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string()
    }
}

fn default_base_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("contrib-report/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(300)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_min_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_per_page() -> u32 {
    100
}

fn default_contributor_page_limit() -> u32 {
    5
}

fn default_max_concurrent_requests() -> usize {
    1
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_report_file_name() -> String {
    "github_contributions_report.md".to_string()
}

fn default_snapshot_file_name() -> String {
    "github_contribution_data.csv".to_string()
}

fn default_true() -> bool {
    true
}

fn default_chart_width() -> u32 {
    1000
}

fn default_chart_height() -> u32 {
    800
}

// Duration serialization helper (integer milliseconds)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
