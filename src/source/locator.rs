use super::prefix::PrefixDiscovery;
use super::timestamp::KeyTimestampExtractor;
use crate::config::types::SourceConfig;
use crate::object_store::{ObjectStore, ObjectStoreError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Caller-supplied time range from the command line. Either bound may be
/// missing; an entirely empty window means "no explicit window".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl SelectionWindow {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn is_explicit(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }
}

/// Which objects of a source are candidates in this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// `start <= t <= end`, both inclusive.
    Window {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// `t > watermark`.
    After(DateTime<Utc>),
    /// Everything discoverable, in listing order.
    FirstRun,
}

impl Selection {
    /// An explicit window wins over the watermark. A missing end defaults to
    /// `now`, a missing start to `end - poll_interval`.
    pub fn resolve(
        window: &SelectionWindow,
        watermark: Option<DateTime<Utc>>,
        poll_interval: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        if window.is_explicit() {
            let end = window.end.unwrap_or(now);
            let interval =
                chrono::Duration::from_std(poll_interval).unwrap_or_else(|_| chrono::Duration::zero());
            let start = window.start.unwrap_or(end - interval);
            return Selection::Window { start, end };
        }

        match watermark {
            Some(ts) => Selection::After(ts),
            None => Selection::FirstRun,
        }
    }

    pub fn admits(&self, ts: DateTime<Utc>) -> bool {
        match self {
            Selection::Window { start, end } => *start <= ts && ts <= *end,
            Selection::After(watermark) => ts > *watermark,
            Selection::FirstRun => true,
        }
    }
}

/// A log object picked for processing, with the timestamp from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedObject {
    pub key: String,
    pub timestamp: DateTime<Utc>,
}

/// Lists a source's bucket and selects log objects by their name timestamp.
pub struct ObjectLocator {
    store: Arc<dyn ObjectStore>,
    discovery: PrefixDiscovery,
    extractor: KeyTimestampExtractor,
}

impl ObjectLocator {
    pub fn new(store: Arc<dyn ObjectStore>, discovery: PrefixDiscovery) -> Self {
        Self {
            store,
            discovery,
            extractor: KeyTimestampExtractor::default(),
        }
    }

    /// Configured prefix, or one found by auto-discovery.
    pub async fn resolve_prefix(&self, source: &SourceConfig) -> String {
        match &source.prefix {
            Some(prefix) => prefix.clone(),
            None => {
                self.discovery
                    .discover(self.store.as_ref(), &source.name, source.region.as_deref())
                    .await
            }
        }
    }

    /// Candidate objects for `selection`, at most `max_objects` of them.
    ///
    /// Listing stops as soon as the cap is reached, so with a cap the result
    /// is the first matches in provider listing order, not the oldest ones.
    /// Keys without the log suffix or a name timestamp are skipped silently.
    pub async fn locate(
        &self,
        source: &SourceConfig,
        selection: &Selection,
        max_objects: usize,
    ) -> Result<Vec<LocatedObject>, ObjectStoreError> {
        let bucket = source.name.as_str();
        let prefix = self.resolve_prefix(source).await;

        match selection {
            Selection::Window { start, end } => {
                info!(bucket = %bucket, prefix = %prefix, start = %start, end = %end, "Listing objects in window")
            }
            Selection::After(ts) => {
                info!(bucket = %bucket, prefix = %prefix, after = %ts, "Listing objects after watermark")
            }
            Selection::FirstRun => {
                info!(bucket = %bucket, prefix = %prefix, max_objects, "Listing objects for first run")
            }
        }

        let mut located = Vec::new();
        let mut scanned = 0usize;
        let mut continuation = None;

        'pages: loop {
            if located.len() >= max_objects {
                break;
            }

            let page = self
                .store
                .list_page(bucket, &prefix, continuation.take(), None)
                .await?;

            for key in page.keys {
                scanned += 1;

                let Some(timestamp) = self.extractor.log_timestamp(&key) else {
                    continue;
                };

                if selection.admits(timestamp) {
                    located.push(LocatedObject { key, timestamp });
                    if located.len() >= max_objects {
                        break 'pages;
                    }
                }
            }

            match page.next {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        info!(bucket = %bucket, scanned, matched = located.len(), "Listing complete");
        if let (Some(first), Some(last)) = (located.first(), located.last()) {
            debug!(bucket = %bucket, first = %first.key, last = %last.key, "Matched object range");
        }

        Ok(located)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::MemoryObjectStore;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 3, h, m, 0).unwrap()
    }

    fn key(h: u32, m: u32) -> String {
        format!("trail/123_CloudTrail_ap-northeast-2_20250903T{h:02}{m:02}Z_x.json.gz")
    }

    fn source() -> SourceConfig {
        SourceConfig {
            name: "bucket".to_string(),
            enabled: true,
            prefix: Some("trail/".to_string()),
            region: None,
            max_objects: None,
        }
    }

    fn locator_with(store: Arc<MemoryObjectStore>) -> ObjectLocator {
        ObjectLocator::new(store, PrefixDiscovery::default())
    }

    #[test]
    fn test_resolve_prefers_explicit_window() {
        let window = SelectionWindow::new(Some(at(1, 0)), Some(at(2, 0)));
        let selection = Selection::resolve(&window, Some(at(5, 0)), Duration::from_secs(300), at(9, 0));
        assert_eq!(selection, Selection::Window { start: at(1, 0), end: at(2, 0) });
    }

    #[test]
    fn test_resolve_window_defaults() {
        let now = at(9, 0);
        let only_start = SelectionWindow::new(Some(at(1, 0)), None);
        assert_eq!(
            Selection::resolve(&only_start, None, Duration::from_secs(300), now),
            Selection::Window { start: at(1, 0), end: now }
        );

        let only_end = SelectionWindow::new(None, Some(at(2, 0)));
        assert_eq!(
            Selection::resolve(&only_end, None, Duration::from_secs(300), now),
            Selection::Window { start: at(1, 55), end: at(2, 0) }
        );
    }

    #[test]
    fn test_resolve_watermark_and_first_run() {
        let window = SelectionWindow::default();
        assert_eq!(
            Selection::resolve(&window, Some(at(3, 0)), Duration::from_secs(300), at(9, 0)),
            Selection::After(at(3, 0))
        );
        assert_eq!(
            Selection::resolve(&window, None, Duration::from_secs(300), at(9, 0)),
            Selection::FirstRun
        );
    }

    #[test]
    fn test_admits_bounds() {
        let window = Selection::Window { start: at(1, 0), end: at(2, 0) };
        assert!(window.admits(at(1, 0)));
        assert!(window.admits(at(2, 0)));
        assert!(!window.admits(at(2, 5)));

        let after = Selection::After(at(1, 0));
        assert!(!after.admits(at(1, 0)));
        assert!(after.admits(at(1, 5)));
    }

    #[tokio::test]
    async fn test_locate_window_inclusive() {
        let store = Arc::new(MemoryObjectStore::new());
        for m in [0, 5, 10, 15] {
            store.put("bucket", &key(1, m), vec![]);
        }

        let located = locator_with(store)
            .locate(&source(), &Selection::Window { start: at(1, 5), end: at(1, 10) }, 50)
            .await
            .unwrap();

        let keys: Vec<_> = located.iter().map(|o| o.key.clone()).collect();
        assert_eq!(keys, vec![key(1, 5), key(1, 10)]);
        assert_eq!(located[0].timestamp, at(1, 5));
    }

    #[tokio::test]
    async fn test_locate_after_watermark_is_strict() {
        let store = Arc::new(MemoryObjectStore::new());
        for m in [0, 5, 10] {
            store.put("bucket", &key(1, m), vec![]);
        }

        let located = locator_with(store)
            .locate(&source(), &Selection::After(at(1, 5)), 50)
            .await
            .unwrap();

        assert_eq!(located.len(), 1);
        assert_eq!(located[0].key, key(1, 10));
    }

    #[tokio::test]
    async fn test_locate_skips_unrecognised_keys() {
        let store = Arc::new(MemoryObjectStore::new());
        store.put("bucket", &key(1, 0), vec![]);
        store.put("bucket", "trail/CloudTrail-Digest/summary.json.gz", vec![]);
        store.put("bucket", "trail/notes.txt", vec![]);
        store.put("bucket", "trail/123_CloudTrail_20250903T0100Z_x.json", vec![]);

        let located = locator_with(store)
            .locate(&source(), &Selection::FirstRun, 50)
            .await
            .unwrap();

        assert_eq!(located.len(), 1);
        assert_eq!(located[0].key, key(1, 0));
    }

    #[tokio::test]
    async fn test_locate_cap_stops_listing() {
        let store = Arc::new(MemoryObjectStore::with_page_size(20));
        for i in 0..200u32 {
            store.put("bucket", &key(i / 60, i % 60), vec![]);
        }

        let located = locator_with(store.clone())
            .locate(&source(), &Selection::FirstRun, 50)
            .await
            .unwrap();

        assert_eq!(located.len(), 50);
        // 50 keys fit in the first three pages of 20
        assert_eq!(store.pages_served(), 3);
    }

    #[tokio::test]
    async fn test_locate_surfaces_listing_errors() {
        let store = Arc::new(MemoryObjectStore::new());
        store.fail_bucket("bucket");

        let result = locator_with(store)
            .locate(&source(), &Selection::FirstRun, 50)
            .await;

        assert!(matches!(result, Err(ObjectStoreError::List { .. })));
    }

    #[tokio::test]
    async fn test_locate_discovers_prefix_when_missing() {
        let store = Arc::new(MemoryObjectStore::new());
        let discovered = "AWSLogs/123/CloudTrail/ap-northeast-2/2025/09/03/123_CloudTrail_ap-northeast-2_20250903T0100Z_x.json.gz";
        store.put("bucket", discovered, vec![]);

        let mut src = source();
        src.prefix = None;

        let located = locator_with(store)
            .locate(&src, &Selection::FirstRun, 50)
            .await
            .unwrap();

        assert_eq!(located.len(), 1);
        assert_eq!(located[0].key, discovered);
    }
}
