use crate::event::EventRecord;
use async_trait::async_trait;
use std::collections::HashSet;

/// Destination for collected events, also used as the existence-check
/// capability for deduplication.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    async fn init_schema(&self) -> Result<(), StorageError>;

    /// Subset of `event_ids` already stored, via one set-membership query.
    async fn existing_ids(&self, event_ids: &[String]) -> Result<HashSet<String>, StorageError>;

    /// Insert one tracking row and one detail row per event inside a single
    /// transaction. Either every row is committed or none is.
    async fn write_events(&self, events: &[EventRecord]) -> Result<usize, StorageError>;

    /// Release pooled connections. Later calls fail with [`StorageError::Closed`].
    async fn close(&self);
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage is closed")]
    Closed,
}

impl From<duckdb::Error> for StorageError {
    fn from(e: duckdb::Error) -> Self {
        StorageError::Database(e.to_string())
    }
}

impl From<r2d2::Error> for StorageError {
    fn from(e: r2d2::Error) -> Self {
        StorageError::Pool(e.to_string())
    }
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(e: tokio::task::JoinError) -> Self {
        StorageError::Database(format!("Task join error: {}", e))
    }
}
