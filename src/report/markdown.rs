//! Markdown report body

use crate::types::{AggregatedReport, EntityRef};
use std::collections::BTreeSet;

/// Report title
pub const TITLE: &str = "# OpenSource Contributions Report";

/// Shown instead of the tables when no user contributed anything
pub const NO_CONTRIBUTIONS: &str = "No contributions found for the given users.";

/// File names of the two charts, relative to the report
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChartFiles {
    /// Per-project chart
    pub project: String,
    /// Per-user chart
    pub user: String,
}

fn avatar(url: Option<&str>) -> String {
    format!("<img src='{}' width='12' height='12'>", url.unwrap_or_default())
}

/// `<img ..> [name](url)`, or the bare name when there is no URL
pub fn linked(entity: &EntityRef) -> String {
    let name = escape_cell(&entity.name);
    let link = match &entity.url {
        Some(url) => format!("[{name}]({url})"),
        None => name,
    };
    format!("{} {link}", avatar(entity.avatar_url.as_deref()))
}

fn linked_list(entities: &BTreeSet<EntityRef>) -> String {
    entities.iter().map(linked).collect::<Vec<_>>().join("<br>")
}

/// Keep free text from breaking table rows
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// Render the whole report
///
/// `generated_at` is printed verbatim under the title.
pub fn render(report: &AggregatedReport, charts: &ChartFiles, generated_at: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("{TITLE}\n\n"));
    out.push_str(&format!("Report auto-generated on: {generated_at}\n\n"));

    summary(&mut out, report);

    out.push_str(&format!(
        "\n<div style=\"display: flex; justify-content: space-around;\">\n  \
         <img src=\"{}\" alt=\"Project wise Contributions\" style=\"width:45%;\">\n  \
         <img src=\"{}\" alt=\"User wise Contributions\" style=\"width:45%;\">\n</div>\n",
        charts.project, charts.user
    ));

    if report.users.is_empty() {
        out.push_str(NO_CONTRIBUTIONS);
        out.push('\n');
        return out;
    }

    project_table(&mut out, report);
    user_table(&mut out, report);
    detail_table(&mut out, report);
    out
}

fn summary(out: &mut String, report: &AggregatedReport) {
    let repositories: BTreeSet<&str> = report.records.iter().map(|r| r.repository()).collect();
    let commits: u64 = report.records.iter().map(|r| r.commit_count()).sum();
    let pulls: u64 = report
        .records
        .iter()
        .map(|r| r.open_pull_request_count())
        .sum();

    out.push_str("## Overall Summary\n\n");
    out.push_str("| Metric | Value |\n");
    out.push_str("|--------|-------|\n");
    out.push_str(&format!(
        "| Total number of projects | {} |\n",
        report.projects.len()
    ));
    if report.users.len() > 1 {
        out.push_str(&format!(
            "| Total number of contributors | {} |\n",
            report.users.len()
        ));
    }
    out.push_str(&format!(
        "| Total number of repositories | {} |\n",
        repositories.len()
    ));
    out.push_str(&format!(
        "| Total number of contributions | {} |\n",
        commits + pulls
    ));
    out.push_str(&format!("| Number of commits | {commits} |\n"));
    out.push_str(&format!("| Number of pull requests (Open) | {pulls} |\n"));
}

fn project_table(out: &mut String, report: &AggregatedReport) {
    let mut projects: Vec<_> = report.projects.iter().collect();
    projects.sort_by(|a, b| b.totals.overall().cmp(&a.totals.overall()));

    out.push_str("\n## Summary of Contributions by each project\n\n");
    out.push_str(
        "| Project Key | Repositories | Users | Commits | Pull Requests (Open) | Overall Contribution |\n",
    );
    out.push_str(
        "|--------------|--------------|-------|---------|----------------------|----------------------|\n",
    );
    for project in projects {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            escape_cell(&project.project),
            linked_list(&project.repositories),
            linked_list(&project.users),
            project.totals.commits,
            project.totals.open_pull_requests,
            project.totals.overall()
        ));
    }
}

fn user_table(out: &mut String, report: &AggregatedReport) {
    let mut users: Vec<_> = report.users.iter().collect();
    users.sort_by(|a, b| b.totals.overall().cmp(&a.totals.overall()));

    out.push_str("\n## Summary of Contributions by each user\n\n");
    out.push_str("| User | Repositories | Commits | Pull Requests (Open) | Overall Contribution |\n");
    out.push_str("|------|--------------|---------|----------------------|----------------------|\n");
    for user in users {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            linked(&user.profile),
            linked_list(&user.repositories),
            user.totals.commits,
            user.totals.open_pull_requests,
            user.totals.overall()
        ));
    }
}

fn detail_table(out: &mut String, report: &AggregatedReport) {
    let mut records: Vec<_> = report.records.iter().collect();
    records.sort_by(|a, b| a.user_meta().display_name.cmp(&b.user_meta().display_name));

    out.push_str("\n## Detailed Contributions\n\n");
    out.push_str(
        "| Project Key | Repository | User | Commits | Pull Requests (Open) | Overall Contribution |\n",
    );
    out.push_str(
        "|--------------|------------|------|---------|----------------------|----------------------|\n",
    );
    for record in records {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            escape_cell(record.project()),
            linked(&record.repository_ref()),
            linked(&record.user_ref()),
            record.commit_count(),
            record.open_pull_request_count(),
            record.overall_contribution()
        ));
    }
}
