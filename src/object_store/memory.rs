use super::{ListPage, ObjectStore, ObjectStoreError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Default)]
struct Contents {
    buckets: HashMap<String, BTreeMap<String, Vec<u8>>>,
    failing_buckets: HashSet<String>,
}

/// In-process object store with S3-like lexicographic, paged listing.
///
/// Used for dry runs and tests; buckets can be marked as failing to
/// simulate access errors.
pub struct MemoryObjectStore {
    contents: Mutex<Contents>,
    page_size: usize,
    pages_served: AtomicUsize,
    objects_fetched: AtomicUsize,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            contents: Mutex::new(Contents::default()),
            page_size: page_size.max(1),
            pages_served: AtomicUsize::new(0),
            objects_fetched: AtomicUsize::new(0),
        }
    }

    pub fn put(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) {
        let mut contents = self.contents.lock().unwrap_or_else(|e| e.into_inner());
        contents
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), body.into());
    }

    /// Every subsequent list or get against `bucket` fails.
    pub fn fail_bucket(&self, bucket: &str) {
        let mut contents = self.contents.lock().unwrap_or_else(|e| e.into_inner());
        contents.failing_buckets.insert(bucket.to_string());
    }

    pub fn pages_served(&self) -> usize {
        self.pages_served.load(Ordering::SeqCst)
    }

    pub fn objects_fetched(&self) -> usize {
        self.objects_fetched.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
        max_keys: Option<i32>,
    ) -> Result<ListPage, ObjectStoreError> {
        let contents = self.contents.lock().unwrap_or_else(|e| e.into_inner());

        if contents.failing_buckets.contains(bucket) {
            return Err(ObjectStoreError::List {
                bucket: bucket.to_string(),
                prefix: prefix.to_string(),
                source: "access denied".into(),
            });
        }

        self.pages_served.fetch_add(1, Ordering::SeqCst);

        let limit = max_keys
            .and_then(|n| usize::try_from(n).ok())
            .map_or(self.page_size, |n| n.min(self.page_size));

        let Some(objects) = contents.buckets.get(bucket) else {
            return Ok(ListPage::default());
        };

        // Continuation tokens are the last key of the previous page.
        let mut matching = objects
            .keys()
            .filter(|key| key.starts_with(prefix))
            .filter(|key| continuation.as_ref().map_or(true, |after| *key > after));

        let keys: Vec<String> = matching.by_ref().take(limit).cloned().collect();
        let next = if matching.next().is_some() {
            keys.last().cloned()
        } else {
            None
        };

        Ok(ListPage { keys, next })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let contents = self.contents.lock().unwrap_or_else(|e| e.into_inner());

        if contents.failing_buckets.contains(bucket) {
            return Err(ObjectStoreError::Get {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: "access denied".into(),
            });
        }

        self.objects_fetched.fetch_add(1, Ordering::SeqCst);

        contents
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}
