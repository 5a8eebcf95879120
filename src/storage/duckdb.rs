use super::rows::{EventRow, SOURCE_PRODUCT};
use super::traits::{EventStore, StorageError};
use crate::config::types::DatabaseConfig;
use crate::event::EventRecord;
use async_trait::async_trait;
use chrono::Utc;
use duckdb::DuckdbConnectionManager;
use r2d2::Pool;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

const IN_MEMORY_POOL_SIZE: u32 = 2;

/// DuckDB implementation of [`EventStore`].
///
/// Connections come from a bounded r2d2 pool. Each call checks one out on a
/// blocking thread and hands it back when the call returns, on success or
/// error alike.
pub struct DuckDbStorage {
    pool: Mutex<Option<Pool<DuckdbConnectionManager>>>,
    group_id: String,
}

impl DuckDbStorage {
    /// Open (or create) the database file named in `config`.
    pub fn open(config: &DatabaseConfig, group_id: &str) -> Result<Self, StorageError> {
        let manager = DuckdbConnectionManager::file(&config.path)?;
        let storage = Self::with_manager(manager, config.pool_size, group_id)?;
        tracing::info!(
            path = %config.path.display(),
            pool_size = config.pool_size,
            "Database connection pool created"
        );
        Ok(storage)
    }

    /// Create an in-memory DuckDB storage instance (for testing)
    pub fn in_memory(group_id: &str) -> Result<Self, StorageError> {
        let manager = DuckdbConnectionManager::memory()?;
        Self::with_manager(manager, IN_MEMORY_POOL_SIZE, group_id)
    }

    fn with_manager(
        manager: DuckdbConnectionManager,
        pool_size: u32,
        group_id: &str,
    ) -> Result<Self, StorageError> {
        let pool = Pool::builder().max_size(pool_size).build(manager)?;
        Ok(Self {
            pool: Mutex::new(Some(pool)),
            group_id: group_id.to_string(),
        })
    }

    fn pool(&self) -> Result<Pool<DuckdbConnectionManager>, StorageError> {
        self.pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(StorageError::Closed)
    }

    /// Number of (tracking, detail) rows currently stored.
    pub async fn row_counts(&self) -> Result<(u64, u64), StorageError> {
        let pool = self.pool()?;

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let tracking: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
            let detail: i64 =
                conn.query_row("SELECT COUNT(*) FROM cloudtrail", [], |row| row.get(0))?;
            Ok::<(u64, u64), StorageError>((tracking as u64, detail as u64))
        })
        .await?
    }
}

#[async_trait]
impl EventStore for DuckDbStorage {
    fn name(&self) -> &str {
        "duckdb"
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        let pool = self.pool()?;

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;

            // Tracking table shared with other event sources
            conn.execute(
                "CREATE TABLE IF NOT EXISTS events (
                    id UUID PRIMARY KEY,
                    group_id VARCHAR NOT NULL,
                    source_product VARCHAR NOT NULL,
                    source_ip VARCHAR,
                    user_agent VARCHAR,
                    created_at TIMESTAMPTZ NOT NULL
                )",
                [],
            )?;

            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_events_group ON events(group_id)",
                [],
            )?;

            // Detail table; id matches the tracking row
            conn.execute(
                "CREATE TABLE IF NOT EXISTS cloudtrail (
                    id UUID PRIMARY KEY,
                    event_id VARCHAR NOT NULL,
                    event_version VARCHAR,
                    event_time VARCHAR,
                    event_source VARCHAR,
                    event_name VARCHAR,
                    event_category VARCHAR,
                    event_type VARCHAR,
                    aws_region VARCHAR,
                    read_only BOOLEAN,
                    request_id VARCHAR,
                    source_ip VARCHAR,
                    user_agent VARCHAR,
                    management_event BOOLEAN,
                    recipient_account_id VARCHAR,
                    session_credential_from_console VARCHAR,
                    shared_event_id VARCHAR,
                    error_code VARCHAR,
                    error_message VARCHAR,
                    user_identity JSON NOT NULL,
                    tls_details JSON,
                    request_parameters JSON,
                    response_elements JSON,
                    insight_details JSON,
                    resources JSON
                )",
                [],
            )?;

            conn.execute(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_cloudtrail_event_id ON cloudtrail(event_id)",
                [],
            )?;

            Ok::<(), StorageError>(())
        })
        .await?
    }

    async fn existing_ids(&self, event_ids: &[String]) -> Result<HashSet<String>, StorageError> {
        if event_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let pool = self.pool()?;
        let event_ids = event_ids.to_vec();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let placeholders = vec!["?"; event_ids.len()].join(", ");
            let mut stmt = conn.prepare(&format!(
                "SELECT DISTINCT event_id FROM cloudtrail WHERE event_id IN ({})",
                placeholders
            ))?;

            let rows = stmt.query_map(duckdb::params_from_iter(event_ids.iter()), |row| {
                row.get::<_, String>(0)
            })?;

            let mut existing = HashSet::new();
            for row in rows {
                existing.insert(row?);
            }
            Ok(existing)
        })
        .await?
    }

    async fn write_events(&self, events: &[EventRecord]) -> Result<usize, StorageError> {
        if events.is_empty() {
            return Ok(0);
        }

        let pool = self.pool()?;
        let group_id = self.group_id.clone();
        let rows = events
            .iter()
            .map(EventRow::from_event)
            .collect::<Result<Vec<_>, _>>()?;

        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            // Dropping the transaction without commit rolls it back.
            let tx = conn.transaction()?;
            {
                let mut tracking = tx.prepare(
                    "INSERT INTO events (id, group_id, source_product, source_ip, user_agent, created_at)
                     VALUES (?, ?, ?, ?, ?, to_timestamp(? / 1000000.0))",
                )?;
                let mut detail = tx.prepare(
                    "INSERT INTO cloudtrail
                     (id, event_id, event_version, event_time, event_source, event_name,
                      event_category, event_type, aws_region, read_only, request_id,
                      source_ip, user_agent, management_event, recipient_account_id,
                      session_credential_from_console, shared_event_id, error_code, error_message,
                      user_identity, tls_details, request_parameters, response_elements,
                      insight_details, resources)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )?;

                let created_at = Utc::now().timestamp_micros();

                for row in &rows {
                    let id = row.id.to_string();
                    let event = &row.event;

                    tracking.execute(duckdb::params![
                        id,
                        group_id,
                        SOURCE_PRODUCT,
                        row.source_ip,
                        event.user_agent,
                        created_at,
                    ])?;

                    detail.execute(duckdb::params![
                        id,
                        event.event_id,
                        event.event_version,
                        event.event_time,
                        event.event_source,
                        event.event_name,
                        event.event_category,
                        event.event_type,
                        event.aws_region,
                        event.read_only,
                        event.request_id,
                        row.source_ip,
                        event.user_agent,
                        event.management_event,
                        event.recipient_account_id,
                        event.session_credential_from_console,
                        event.shared_event_id,
                        event.error_code,
                        event.error_message,
                        row.user_identity,
                        row.tls_details,
                        row.request_parameters,
                        row.response_elements,
                        row.insight_details,
                        row.resources,
                    ])?;
                }
            }
            tx.commit()?;

            Ok::<usize, StorageError>(rows.len())
        })
        .await?;

        match &result {
            Ok(count) => tracing::info!(count, "Stored events"),
            Err(e) => tracing::warn!(error = %e, "Event batch rolled back"),
        }
        result
    }

    async fn close(&self) {
        let pool = self
            .pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if pool.is_some() {
            drop(pool);
            tracing::info!("Database connection pool closed");
        }
    }
}
