//! End-to-end report generation
//!
//! Two entry points share the aggregation and output stages:
//! - [`generate_report`]: live collection from the GitHub API
//! - [`generate_report_from_snapshot`]: re-render from a CSV snapshot, no network

use crate::aggregate::aggregate;
use crate::collector::ContributionCollector;
use crate::config::{Config, ReportInput};
use crate::error::{Error, Result};
use crate::fetcher::PagedFetcher;
use crate::github::GitHubApi;
use crate::pacing::RequestPacer;
use crate::report::{ReportAssembler, ReportOutputs, read_snapshot};
use std::path::Path;

/// Build the collector for `config`
///
/// # Errors
/// Returns a configuration error if the settings are invalid or the HTTP client cannot be
/// built
pub fn build_collector(config: &Config) -> Result<ContributionCollector> {
    config.validate()?;
    let pacer = RequestPacer::from_config(&config.pacing);
    let fetcher = PagedFetcher::new(&config.client, config.retry.clone(), pacer)?;
    let api = GitHubApi::new(fetcher, config.collector.per_page);
    Ok(ContributionCollector::new(api, config.collector.clone()))
}

/// Collect contributions for `input`, aggregate them and write the report
///
/// # Errors
/// - [`Error::Config`] when no repository can be resolved
/// - [`Error::Collection`] when a fetch fails after retries
/// - I/O, snapshot or chart errors while writing outputs
pub async fn generate_report(config: &Config, input: &ReportInput) -> Result<ReportOutputs> {
    tracing::info!(
        users = input.users.len(),
        start_date = %input.start_date,
        "Generating contributions report"
    );

    let collector = build_collector(config)?;
    let projects = collector.resolve_projects(input).await?;
    if projects.values().all(Vec::is_empty) {
        return Err(Error::config(
            "project_to_repo_dict",
            "no repositories to collect: none configured and none discovered for the given users",
        ));
    }

    let records = collector.collect_projects(input, &projects).await?;
    let report = aggregate(records);
    ReportAssembler::new(config.report.clone()).write(&report)
}

/// Re-render a report from a CSV snapshot
///
/// The snapshot is never rewritten by this path.
pub fn generate_report_from_snapshot(config: &Config, snapshot: &Path) -> Result<ReportOutputs> {
    tracing::info!(path = %snapshot.display(), "Generating report from snapshot");

    let records = read_snapshot(snapshot)?;
    let report = aggregate(records);

    let mut report_config = config.report.clone();
    report_config.dump_snapshot = false;
    ReportAssembler::new(report_config).write(&report)
}
