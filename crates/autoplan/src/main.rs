use anyhow::{Context, anyhow};
use autoplan_engine::Orchestrator;
use autoplan_engine::cli::{self, OutputHandlers, RunOptions};
use autoplan_engine::config::{ConfigLoader, EngineConfig};
use autoplan_engine::report::ReportStatus;
use autoplan_h::ChromiumDriver;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "autoplan", version, about = "Run browser automation plans")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a plan (JSON or YAML) against a Chromium session
    Run {
        plan: PathBuf,
        /// Skip submit-like clicks
        #[arg(long)]
        safe_run: bool,
        /// Launch browser in visible mode (not headless)
        #[arg(long)]
        visible: bool,
        /// Engine configuration file (defaults: ./autoplan.yaml, ~/.autoplan/config.yaml)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write the JSON execution report here
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Normalize a plan and print its canonical form
    Validate { plan: PathBuf },
    /// Summarize failure categories across saved reports
    Analyze {
        #[arg(required = true)]
        reports: Vec<PathBuf>,
    },
}

async fn load_config(path: Option<&PathBuf>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => ConfigLoader::load_from(path)
            .await
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(ConfigLoader::load_default().await?),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the report.
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let output = OutputHandlers {
        out: |msg| println!("{}", msg),
        err: |msg| eprintln!("{}", msg),
    };

    match args.command {
        Command::Run {
            plan,
            safe_run,
            visible,
            config,
            report,
        } => {
            let mut config = load_config(config.as_ref()).await?;
            if visible {
                config.browser.headless = false;
            }
            let orchestrator = Orchestrator::new(Arc::new(ChromiumDriver::new()), config);
            let options = RunOptions {
                safe_run,
                report_path: report.as_deref(),
            };
            let report = cli::run_plan_file(&orchestrator, output, &plan, options)
                .await
                .map_err(|e| anyhow!("{}", e))?;
            Ok(match report.status {
                ReportStatus::Success => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            })
        }
        Command::Validate { plan } => {
            cli::validate_plan_file(output, &plan)
                .await
                .map_err(|e| anyhow!("{}", e))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Analyze { reports } => {
            cli::analyze_report_files(output, &reports)
                .await
                .map_err(|e| anyhow!("{}", e))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
