//! # contrib-report
//!
//! Collects GitHub contribution activity (commits and open pull requests) for a set of users
//! across a set of repositories, aggregates it per user and per project, and writes a
//! Markdown report with two proportional charts.
//!
//! ## Design Philosophy
//!
//! contrib-report is designed to be:
//! - **Polite to the API** - Every request is paced globally and retried with backoff
//! - **All-or-nothing** - The first request that fails for good aborts the run
//! - **Library-first** - The CLI is a thin wrapper over [`pipeline`]
//! - **Sensible defaults** - Only the input file is required
//!
//! ## Quick Start
//!
//! ```no_run
//! use contrib_report::{Config, InputConfig, generate_report};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.client.apply_env();
//!
//!     let input = InputConfig::from_file(Path::new("input/github.json"))?.validate()?;
//!     let outputs = generate_report(&config, &input).await?;
//!
//!     println!("Report written to {}", outputs.report.display());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Filtering and per-user / per-project rollups
pub mod aggregate;
/// Proportional buckets for the charts
pub mod buckets;
/// Contribution collection from the GitHub API
pub mod collector;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Paginated HTTP fetching
pub mod fetcher;
/// Typed GitHub REST endpoints
pub mod github;
/// Global request pacing
pub mod pacing;
/// End-to-end report generation
pub mod pipeline;
/// Markdown report, charts and CSV snapshot
pub mod report;
/// Retry logic with exponential backoff
pub mod retry;
/// Core types
pub mod types;

// Re-export commonly used types
pub use aggregate::aggregate;
pub use collector::ContributionCollector;
pub use config::{Config, InputConfig, ReportInput};
pub use error::{CollectionError, CollectionStage, Error, FetchCause, FetchError, Result};
pub use fetcher::{PageRequest, PagedFetcher, PaginationMode};
pub use github::GitHubApi;
pub use pacing::RequestPacer;
pub use pipeline::{generate_report, generate_report_from_snapshot};
pub use report::{ReportAssembler, ReportOutputs};
pub use types::{
    AggregatedReport, ContributionRecord, ContributorRank, ProjectRollup, RepositoryId,
    UserRollup,
};
