pub mod memory;
pub mod s3;

pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

use async_trait::async_trait;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure to reach a bucket or object. Always scoped to one source.
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("failed to list s3://{bucket}/{prefix}: {source}")]
    List {
        bucket: String,
        prefix: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to fetch s3://{bucket}/{key}: {source}")]
    Get {
        bucket: String,
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("object not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },
}

/// One page of a prefix listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub keys: Vec<String>,
    /// Continuation token for the next page, `None` on the last page.
    pub next: Option<String>,
}

/// Read access to a bucket-oriented object store.
///
/// Listing is paged so callers can stop early without enumerating the
/// rest of a prefix.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
        max_keys: Option<i32>,
    ) -> Result<ListPage, ObjectStoreError>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ObjectStoreError>;
}
