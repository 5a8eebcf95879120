use crate::event::EventRecord;
use crate::storage::EventStore;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Filters out records whose identifier is already stored.
///
/// A failed lookup is treated as "nothing stored yet": the chunk goes on to
/// the sink, whose unique index decides. Duplicates can reach the sink this
/// way, stored records can never be dropped.
pub struct DedupGate {
    store: Arc<dyn EventStore>,
}

impl DedupGate {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Ids in `event_ids` that are already stored. One query per call, none
    /// for empty input.
    pub async fn existing(&self, event_ids: &[String]) -> HashSet<String> {
        if event_ids.is_empty() {
            return HashSet::new();
        }

        match self.store.existing_ids(event_ids).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!(
                    store = %self.store.name(),
                    ids = event_ids.len(),
                    error = %e,
                    "Existence check failed, treating chunk as new"
                );
                HashSet::new()
            }
        }
    }

    /// Keep the records of `chunk` that are not stored, in order.
    pub async fn retain_new(&self, chunk: Vec<EventRecord>) -> Vec<EventRecord> {
        let ids: Vec<String> = chunk.iter().map(|r| r.event_id.clone()).collect();
        let existing = self.existing(&ids).await;

        let fresh: Vec<EventRecord> = chunk
            .into_iter()
            .filter(|r| !existing.contains(&r.event_id))
            .collect();

        debug!(
            checked = ids.len(),
            existing = existing.len(),
            new = fresh.len(),
            "Dedup chunk"
        );

        fresh
    }
}
