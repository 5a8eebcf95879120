use crate::collector::{BatchCollector, Watermarks};
use crate::config::types::{Config, SourceConfig};
use crate::event::{EventNameFilter, EventRecord};
use crate::object_store::ObjectStore;
use crate::source::SelectionWindow;
use crate::storage::{EventStore, StorageError};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no destination configured")]
    NoDestinations,

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Idle,
    Running,
    Sleeping,
    Stopped,
}

/// What one collect-and-send cycle did.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub success: bool,
    /// New records collected this cycle.
    pub records: Vec<EventRecord>,
    /// Destinations that committed the batch.
    pub delivered: usize,
    pub failed_destinations: Vec<String>,
    pub failed_sources: Vec<String>,
    pub interrupted: bool,
}

impl CycleReport {
    pub fn collected(&self) -> usize {
        self.records.len()
    }
}

/// Drives the batch collector, once or on a fixed interval.
///
/// The first destination doubles as the dedup lookup. Watermarks are held
/// here for the life of the process.
pub struct CloudTrailService {
    collector: BatchCollector,
    sinks: Vec<Arc<dyn EventStore>>,
    sources: Vec<SourceConfig>,
    watermarks: Watermarks,
    state: ServiceState,
}

impl CloudTrailService {
    pub fn new(
        collector: BatchCollector,
        sinks: Vec<Arc<dyn EventStore>>,
        sources: &[SourceConfig],
    ) -> Self {
        let enabled: Vec<SourceConfig> = sources.iter().filter(|s| s.enabled).cloned().collect();

        let disabled = sources.len() - enabled.len();
        if disabled > 0 {
            info!(disabled, "Ignoring disabled sources");
        }

        Self {
            collector,
            sinks,
            sources: enabled,
            watermarks: Watermarks::new(),
            state: ServiceState::Idle,
        }
    }

    /// Wire a service from config. `sinks` must not be empty.
    pub fn from_config(
        config: &Config,
        objects: Arc<dyn ObjectStore>,
        sinks: Vec<Arc<dyn EventStore>>,
    ) -> Result<Self, ServiceError> {
        let dedup = sinks.first().cloned().ok_or(ServiceError::NoDestinations)?;
        let collector =
            BatchCollector::new(objects, dedup, &config.collection, &config.discovery);

        Ok(Self::new(collector, sinks, &config.sources))
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn sources(&self) -> &[SourceConfig] {
        &self.sources
    }

    pub fn watermarks(&self) -> &Watermarks {
        &self.watermarks
    }

    /// Create tables on every destination.
    pub async fn init(&self) -> Result<(), ServiceError> {
        for sink in &self.sinks {
            sink.init_schema().await?;
            info!(destination = %sink.name(), "Destination ready");
        }
        Ok(())
    }

    /// One cycle: collect from every source, then write to every destination.
    ///
    /// Succeeds when nothing new was found or at least one destination took
    /// the batch. Watermarks only move for watermark-mode cycles whose batch
    /// was delivered, so a failed write is retried on the next cycle.
    pub async fn collect_and_send(
        &mut self,
        filter: Option<&EventNameFilter>,
        window: &SelectionWindow,
        cancel: &CancellationToken,
    ) -> CycleReport {
        self.state = ServiceState::Running;

        if self.sources.is_empty() {
            error!("No enabled sources configured");
            return CycleReport::default();
        }

        info!(
            sources = self.sources.len(),
            explicit_window = window.is_explicit(),
            "Starting collection cycle"
        );

        let batch = self
            .collector
            .collect_batch(&self.sources, window, filter, &self.watermarks, cancel)
            .await;

        let mut report = CycleReport {
            failed_sources: batch.failed_sources,
            interrupted: batch.interrupted,
            records: batch.records,
            ..CycleReport::default()
        };

        if report.records.is_empty() {
            info!("No new events collected");
            report.success = true;
        } else {
            if let Some(first) = report.records.first() {
                debug!(
                    event_name = %first.event_name,
                    event_time = %first.event_time,
                    event_source = %first.event_source,
                    aws_region = %first.aws_region,
                    identity_type = %first.user_identity.identity_type,
                    source_ip = %first.source_ip_address,
                    "Sample event"
                );
            }

            for sink in &self.sinks {
                match sink.write_events(&report.records).await {
                    Ok(count) => {
                        info!(destination = %sink.name(), count, "Batch delivered");
                        report.delivered += 1;
                    }
                    Err(e) => {
                        error!(destination = %sink.name(), error = %e, "Batch delivery failed");
                        report.failed_destinations.push(sink.name().to_string());
                    }
                }
            }
            report.success = report.delivered > 0;
        }

        if report.success && !window.is_explicit() {
            let moved = self.watermarks.merge(&batch.watermarks);
            for (source, ts) in batch.watermarks.iter() {
                debug!(source = %source, watermark = %ts, "Watermark candidate");
            }
            debug!(moved, "Watermarks updated");
        }

        info!(
            success = report.success,
            collected = report.collected(),
            delivered = report.delivered,
            failed_sources = report.failed_sources.len(),
            "Collection cycle finished"
        );

        report
    }

    /// Run cycles until `cancel` fires; returns the number of cycles run.
    ///
    /// A failed cycle is logged and the loop carries on after the interval.
    /// Cancellation is honoured between cycles and while sleeping; a cycle
    /// in progress stops at the next source boundary.
    pub async fn run(
        &mut self,
        filter: Option<&EventNameFilter>,
        cancel: &CancellationToken,
    ) -> usize {
        let interval = self.collector.poll_interval();
        let window = SelectionWindow::default();
        let mut cycles = 0usize;

        info!(
            poll_interval = ?interval,
            sources = self.sources.len(),
            "Service started"
        );

        while !cancel.is_cancelled() {
            let report = self.collect_and_send(filter, &window, cancel).await;
            cycles += 1;

            if !report.success {
                warn!(cycle = cycles, "Collection cycle failed, retrying after interval");
            }

            self.state = ServiceState::Sleeping;
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        self.state = ServiceState::Stopped;
        info!(cycles, "Service stopped");
        cycles
    }

    /// Release every destination's connections.
    pub async fn shutdown(&mut self) {
        for sink in &self.sinks {
            sink.close().await;
        }
        self.state = ServiceState::Stopped;
    }
}
