use super::dedup::DedupGate;
use super::watermark::Watermarks;
use crate::config::types::{CollectionConfig, DiscoveryConfig, SourceConfig};
use crate::event::{EventNameFilter, EventRecord};
use crate::object_store::{ObjectStore, ObjectStoreError};
use crate::source::{ObjectDecoder, ObjectLocator, PrefixDiscovery, Selection, SelectionWindow};
use crate::storage::EventStore;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Result of one collection pass over all sources.
#[derive(Debug, Default)]
pub struct CollectedBatch {
    /// New records, in source order then discovery order.
    pub records: Vec<EventRecord>,
    /// Highest decoded object timestamp per source that produced one.
    pub watermarks: Watermarks,
    /// Sources skipped this pass because listing failed.
    pub failed_sources: Vec<String>,
    /// The pass stopped early on cancellation.
    pub interrupted: bool,
}

struct SourceOutcome {
    records: Vec<EventRecord>,
    watermark: Option<DateTime<Utc>>,
    objects: usize,
    failed_objects: usize,
}

/// Locates, decodes and deduplicates log objects across sources.
///
/// Sources are handled one after another. A source whose listing fails adds
/// nothing to the batch and keeps its watermark; a single object that fails
/// to fetch or decode is skipped.
pub struct BatchCollector {
    locator: ObjectLocator,
    decoder: ObjectDecoder,
    gate: DedupGate,
    batch_size: usize,
    default_max_objects: usize,
    poll_interval: Duration,
}

impl BatchCollector {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        dedup: Arc<dyn EventStore>,
        collection: &CollectionConfig,
        discovery: &DiscoveryConfig,
    ) -> Self {
        Self {
            locator: ObjectLocator::new(objects.clone(), PrefixDiscovery::from(discovery)),
            decoder: ObjectDecoder::new(objects),
            gate: DedupGate::new(dedup),
            batch_size: collection.batch_size.max(1),
            default_max_objects: collection.max_objects,
            poll_interval: collection.poll_interval,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Collect new records from every source.
    ///
    /// An explicit `window` applies to all sources; otherwise each source
    /// resumes after its entry in `watermarks`, or starts a first run.
    /// Cancellation is checked before each source.
    pub async fn collect_batch(
        &self,
        sources: &[SourceConfig],
        window: &SelectionWindow,
        filter: Option<&EventNameFilter>,
        watermarks: &Watermarks,
        cancel: &CancellationToken,
    ) -> CollectedBatch {
        let mut batch = CollectedBatch::default();
        let mut seen = HashSet::new();
        let now = Utc::now();

        for source in sources {
            if cancel.is_cancelled() {
                info!(source = %source.name, "Cancellation requested, stopping before source");
                batch.interrupted = true;
                break;
            }

            let selection =
                Selection::resolve(window, watermarks.get(&source.name), self.poll_interval, now);

            match self.collect_source(source, &selection, filter, &mut seen).await {
                Ok(outcome) => {
                    info!(
                        source = %source.name,
                        objects = outcome.objects,
                        failed_objects = outcome.failed_objects,
                        records = outcome.records.len(),
                        "Source collected"
                    );
                    if let Some(ts) = outcome.watermark {
                        batch.watermarks.advance(&source.name, ts);
                    }
                    batch.records.extend(outcome.records);
                }
                Err(e) => {
                    error!(source = %source.name, error = %e, "Skipping source for this cycle");
                    batch.failed_sources.push(source.name.clone());
                }
            }
        }

        batch
    }

    async fn collect_source(
        &self,
        source: &SourceConfig,
        selection: &Selection,
        filter: Option<&EventNameFilter>,
        seen: &mut HashSet<String>,
    ) -> Result<SourceOutcome, ObjectStoreError> {
        let max_objects = source.max_objects.unwrap_or(self.default_max_objects);
        let located = self.locator.locate(source, selection, max_objects).await?;

        let mut outcome = SourceOutcome {
            records: Vec::new(),
            watermark: None,
            objects: located.len(),
            failed_objects: 0,
        };

        for object in located {
            let decoded = match self.decoder.decode(&source.name, &object.key, filter).await {
                Ok(decoded) => decoded,
                Err(e) => {
                    warn!(source = %source.name, key = %object.key, error = %e, "Skipping object");
                    outcome.failed_objects += 1;
                    continue;
                }
            };

            outcome.watermark = outcome.watermark.max(Some(object.timestamp));

            let mut records = decoded.records.into_iter().peekable();
            while records.peek().is_some() {
                // Repeats within this pass are dropped before the lookup.
                let chunk: Vec<EventRecord> = records
                    .by_ref()
                    .take(self.batch_size)
                    .filter(|r| {
                        let first = seen.insert(r.event_id.clone());
                        if !first {
                            debug!(
                                source = %source.name,
                                event_id = %r.event_id,
                                "Dropping repeat within cycle"
                            );
                        }
                        first
                    })
                    .collect();

                outcome.records.extend(self.gate.retain_new(chunk).await);
            }
        }

        Ok(outcome)
    }
}
