use crate::cli::dates::{window_from_args, DateParseError};
use crate::config::{load_config, resolve_config_path, ConfigError};
use crate::event::{save_envelope, ArchiveError, EventNameFilter};
use crate::object_store::S3ObjectStore;
use crate::service::{CloudTrailService, ServiceError};
use crate::source::SelectionWindow;
use crate::storage::{DuckDbStorage, EventStore, StorageError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error(
        "config not found; searched ~/.config/trailsync/config.yml and /etc/trailsync/config.yml \
         (use --config <path>)"
    )]
    ConfigNotFound,

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("date error: {0}")]
    DateParse(#[from] DateParseError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    #[error("export error: {0}")]
    Export(#[from] ArchiveError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RunMode {
    /// Single cycle, optionally over an explicit date window.
    Once,
    /// Poll until interrupted.
    Service,
}

#[derive(Debug, Clone)]
pub struct RunArgs {
    pub config: Option<PathBuf>,
    pub mode: RunMode,
    pub events: Vec<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub export: Option<PathBuf>,
}

/// Returns `Ok(false)` when a once-cycle reports failure.
pub async fn run(args: RunArgs) -> Result<bool, RunError> {
    let window = match args.mode {
        RunMode::Once => window_from_args(args.start_date.as_deref(), args.end_date.as_deref())?,
        RunMode::Service => {
            if args.start_date.is_some() || args.end_date.is_some() {
                warn!("Date options only apply to --mode once, ignoring them");
            }
            SelectionWindow::default()
        }
    };

    let config_path = resolve_config_path(args.config.as_deref()).ok_or(RunError::ConfigNotFound)?;
    info!(config_path = %config_path.display(), "Loading configuration");
    let config = load_config(&config_path)?;

    let filter = EventNameFilter::from_names(args.events.iter().cloned());
    if let Some(filter) = &filter {
        info!(events = filter.len(), "Filtering by event name");
    }

    info!(path = %config.database.path.display(), "Initializing storage");
    let storage: Arc<dyn EventStore> =
        Arc::new(DuckDbStorage::open(&config.database, &config.group_id)?);

    info!(region = %config.aws.region, "Initializing S3 client");
    let objects = Arc::new(S3ObjectStore::from_env(&config.aws.region).await);

    let mut service = CloudTrailService::from_config(&config, objects, vec![storage])?;

    let cancel = CancellationToken::new();
    spawn_signal_listener(cancel.clone());

    let outcome = drive(&mut service, &args, filter.as_ref(), &window, &cancel).await;

    service.shutdown().await;
    info!("Shutdown complete");

    outcome
}

async fn drive(
    service: &mut CloudTrailService,
    args: &RunArgs,
    filter: Option<&EventNameFilter>,
    window: &SelectionWindow,
    cancel: &CancellationToken,
) -> Result<bool, RunError> {
    service.init().await?;

    match args.mode {
        RunMode::Once => run_once(service, filter, window, args.export.as_deref(), cancel).await,
        RunMode::Service => {
            if args.export.is_some() {
                warn!("--export only applies to --mode once, ignoring it");
            }
            info!("Service running, press Ctrl+C to stop");
            service.run(filter, cancel).await;
            Ok(true)
        }
    }
}

async fn run_once(
    service: &mut CloudTrailService,
    filter: Option<&EventNameFilter>,
    window: &SelectionWindow,
    export: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<bool, RunError> {
    if let (Some(start), Some(end)) = (window.start, window.end) {
        info!(start = %start, end = %end, "Collecting date window");
    }

    let report = service.collect_and_send(filter, window, cancel).await;

    if let Some(path) = export {
        save_envelope(path, &report.records)?;
    }

    Ok(report.success)
}

fn spawn_signal_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("Shutdown signal received");
        cancel.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal as unix_signal, SignalKind};

    match unix_signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "Failed to install SIGTERM handler");
            let _ = signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = signal::ctrl_c().await;
}
