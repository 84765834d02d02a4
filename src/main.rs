use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use storygate::{
    catalogue, load_configuration, stories, HarnessConfig, HarnessError, RunSummary, StoryRunner,
};
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(author, version = env!("STORYGATE_LONG_VERSION"), about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Enable debug mode
    #[arg(short, long, global = true)]
    debug: bool,

    /// Output format
    #[arg(short, long, default_value = "human", global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, clap::ValueEnum)]
enum OutputFormat {
    Human,
    Json,
    Yaml,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the id of every story
    List,

    /// Run stories and compare their captures with the baselines
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Only run these story ids (repeatable)
    #[arg(long = "story", value_name = "ID")]
    stories: Vec<String>,

    /// Baseline directory (overrides SNAPSHOTS_DIR)
    #[arg(long, value_name = "DIR")]
    snapshots_dir: Option<PathBuf>,

    /// Overwrite baselines with the new captures
    #[arg(long)]
    update_snapshots: bool,

    /// Play step timeout, e.g. `5s` or `750ms`
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Refuse every request that is not intercepted
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.debug)?;

    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let config = load_configuration(cli.config.as_deref(), &cwd)
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::List => {
            cmd_list(&config, &cli.output)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run(args) => {
            let summary = cmd_run(args, config, &cwd).await?;
            print_summary(&summary, &cli.output)?;
            if summary.is_success() {
                Ok(ExitCode::SUCCESS)
            } else {
                error!(failed = summary.failed, "Some stories failed");
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

fn cmd_list(config: &HarnessConfig, output: &OutputFormat) -> Result<()> {
    let ids: Vec<String> = catalogue(config)
        .iter()
        .map(|story| story.id.to_string())
        .collect();
    match output {
        OutputFormat::Human => {
            for id in ids {
                println!("{}", id);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&ids)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&ids)?),
    }
    Ok(())
}

async fn cmd_run(args: RunArgs, mut config: HarnessConfig, cwd: &Path) -> Result<RunSummary> {
    if let Some(dir) = args.snapshots_dir {
        config.snapshots.dir = dir;
        config.resolve_paths(cwd);
    }
    if args.update_snapshots {
        config.snapshots.update = true;
    }
    if let Some(timeout) = args.timeout {
        config.play_timeout_ms = timeout.as_millis() as u64;
    }
    if args.offline {
        config.offline = true;
    }

    let all = catalogue(&config);
    let selected = stories::select(&all, &args.stories).map_err(HarnessError::UnknownStory)?;

    info!(
        stories = selected.len(),
        snapshots_dir = %config.snapshots.dir.display(),
        "Running stories"
    );
    let runner = StoryRunner::from_config(config).context("Failed to create story runner")?;
    let cancel = runner.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling story run");
            cancel.cancel();
        }
    });
    let summary = runner.run_all(&selected).await;
    Ok(summary)
}

fn print_summary(summary: &RunSummary, output: &OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(summary)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(summary)?),
        OutputFormat::Human => {
            for report in &summary.reports {
                let verdict = if report.passed() { "PASS" } else { "FAIL" };
                println!("{} {} ({} ms)", verdict, report.id, report.duration_ms);
                println!("    play: {:?}", report.play);
                match &report.snapshot {
                    Some(outcome) => println!("    snapshot: {:?}", outcome),
                    None => println!("    snapshot: skipped"),
                }
                println!("    status: {}", report.status_text);
                if let Some(error) = &report.error {
                    println!("    error: {}", error);
                }
                println!(
                    "    requests: {} intercepted, {} passed through",
                    report.intercept.intercepted, report.intercept.passthrough
                );
            }
            println!("{} passed, {} failed", summary.passed, summary.failed);
        }
    }
    Ok(())
}

fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}
