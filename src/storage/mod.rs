pub mod duckdb;
pub mod rows;
pub mod traits;

pub use self::duckdb::DuckDbStorage;
pub use rows::{normalize_source_ip, EventRow, SOURCE_PRODUCT};
pub use traits::{EventStore, StorageError};
