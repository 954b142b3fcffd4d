use clap::{ArgAction, Parser, Subcommand};
use contrib_report::config::INPUT_FORMAT_HINT;
use contrib_report::{Config, Error, InputConfig, ReportOutputs, Result};
use contrib_report::{generate_report, generate_report_from_snapshot};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "contrib-report")]
#[command(about = "GitHub contributions report generator", version)]
struct Cli {
    /// JSON settings file (retry, pacing, collector and report tuning)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    /// Output directory
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,
    /// Markdown report file name
    #[arg(long, global = true)]
    report_name: Option<String>,
    /// Fold users below this percentage of the top contributor into "Other" (-1 disables)
    #[arg(long, global = true, allow_negative_numbers = true)]
    threshold: Option<f64>,
    /// More logging (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect contributions from GitHub and write the report
    Collect {
        /// Input file with start_date, users and the optional project map
        #[arg(long, default_value = "input/github.json")]
        input: PathBuf,
        /// Do not write the CSV snapshot
        #[arg(long, default_value_t = false)]
        no_snapshot: bool,
    },
    /// Re-render the report from a CSV snapshot
    Render {
        /// Snapshot written by a previous collect run
        #[arg(long, default_value = "output/github_contribution_data.csv")]
        snapshot: PathBuf,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "contrib_report=info",
        1 => "contrib_report=debug",
        _ => "contrib_report=trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.settings {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.client.apply_env();

    if let Some(dir) = &cli.output_dir {
        config.report.output_dir = dir.clone();
    }
    if let Some(name) = &cli.report_name {
        config.report.report_file_name = name.clone();
    }
    if let Some(threshold) = cli.threshold {
        config.report.other_threshold = Some(threshold);
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<ReportOutputs> {
    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Collect { input, no_snapshot } => {
            if no_snapshot {
                config.report.dump_snapshot = false;
            }
            if config.client.token.is_none() {
                warn!("GITHUB_TOKEN is not set; unauthenticated requests are heavily rate limited");
            }
            let input = InputConfig::from_file(&input)?.validate()?;
            generate_report(&config, &input).await
        }
        Commands::Render { snapshot } => generate_report_from_snapshot(&config, &snapshot),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(outputs) => {
            info!(
                report = %outputs.report.display(),
                project_chart = %outputs.project_chart.display(),
                user_chart = %outputs.user_chart.display(),
                "Report generated"
            );
            if let Some(snapshot) = outputs.snapshot {
                info!(snapshot = %snapshot.display(), "Snapshot saved");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Report generation failed");
            if matches!(e, Error::Config { .. }) {
                eprintln!("Expected input file format:\n{INPUT_FORMAT_HINT}");
            }
            ExitCode::FAILURE
        }
    }
}
