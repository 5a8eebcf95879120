use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trailsync::cli::run::{RunArgs, RunMode};

#[derive(Parser)]
#[command(name = "trailsync")]
#[command(about = "CloudTrail log ingestion from S3", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.config/trailsync/config.yml, then /etc/trailsync/config.yml)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = RunMode::Service)]
    mode: RunMode,

    /// Only collect these event names
    #[arg(long, num_args = 1..)]
    events: Vec<String>,

    /// YYYY-MM-DD, YYYY-MM-DD HH:MM or YYYY-MM-DD HH:MM:SS (UTC, once mode)
    #[arg(long)]
    start_date: Option<String>,

    /// Same formats as --start-date; a bare date covers the whole day
    #[arg(long)]
    end_date: Option<String>,

    /// Write collected records to this JSON file (once mode)
    #[arg(long)]
    export: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trailsync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let args = RunArgs {
        config: cli.config,
        mode: cli.mode,
        events: cli.events,
        start_date: cli.start_date,
        end_date: cli.end_date,
        export: cli.export,
    };

    match trailsync::cli::run::run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            tracing::error!("Collection cycle failed");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
