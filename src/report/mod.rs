//! Report output
//!
//! The [`ReportAssembler`] writes everything a run produces into the output directory:
//! the Markdown report, the two contribution charts and (optionally) the CSV snapshot.

pub mod chart;
pub mod markdown;
pub mod snapshot;

pub use chart::{ChartRenderer, SvgDonutRenderer};
pub use markdown::ChartFiles;
pub use snapshot::{RecordRow, read_snapshot, write_snapshot};

use crate::buckets::{project_buckets, user_buckets};
use crate::config::ReportConfig;
use crate::error::Result;
use crate::types::AggregatedReport;
use std::path::PathBuf;

/// Base name of the per-project chart
pub const PROJECT_CHART_STEM: &str = "project_wise_contribution";

/// Base name of the per-user chart
pub const USER_CHART_STEM: &str = "user_wise_contribution";

/// Files written by one [`ReportAssembler::write`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportOutputs {
    /// Markdown report
    pub report: PathBuf,
    /// Per-project chart
    pub project_chart: PathBuf,
    /// Per-user chart
    pub user_chart: PathBuf,
    /// CSV snapshot, when written
    pub snapshot: Option<PathBuf>,
}

/// Writes the report, charts and snapshot
pub struct ReportAssembler<R = SvgDonutRenderer> {
    config: ReportConfig,
    renderer: R,
}

impl ReportAssembler<SvgDonutRenderer> {
    /// Assembler with the default SVG donut charts sized from `config`
    pub fn new(config: ReportConfig) -> Self {
        let renderer = SvgDonutRenderer::new(config.chart_width, config.chart_height);
        Self { config, renderer }
    }
}

impl<R: ChartRenderer> ReportAssembler<R> {
    /// Assembler with a custom chart renderer
    pub fn with_renderer(config: ReportConfig, renderer: R) -> Self {
        Self { config, renderer }
    }

    /// Write all outputs for `report`
    ///
    /// The project chart is never thresholded; the user chart folds small users into
    /// "Other" according to [`ReportConfig::other_threshold`]. The snapshot is written only
    /// when `dump_snapshot` is set.
    pub fn write(&self, report: &AggregatedReport) -> Result<ReportOutputs> {
        let dir = &self.config.output_dir;
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            tracing::info!(path = %dir.display(), "Created output directory");
        }

        let charts = ChartFiles {
            project: format!("{PROJECT_CHART_STEM}.{}", self.renderer.extension()),
            user: format!("{USER_CHART_STEM}.{}", self.renderer.extension()),
        };
        let project_chart = dir.join(&charts.project);
        let user_chart = dir.join(&charts.user);

        self.renderer.render(
            "Project wise Contributions",
            "Project Key",
            &project_buckets(&report.projects, None),
            &project_chart,
        )?;
        self.renderer.render(
            "User wise Contributions",
            "User",
            &user_buckets(&report.users, self.config.other_threshold),
            &user_chart,
        )?;

        let generated_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let body = markdown::render(report, &charts, &generated_at);
        let report_path = self.config.report_path();
        std::fs::write(&report_path, body)?;
        tracing::info!(path = %report_path.display(), "Markdown report created");

        let snapshot = if self.config.dump_snapshot {
            let path = self.config.snapshot_path();
            write_snapshot(&path, &report.records)?;
            Some(path)
        } else {
            None
        };

        Ok(ReportOutputs {
            report: report_path,
            project_chart,
            user_chart,
            snapshot,
        })
    }
}
