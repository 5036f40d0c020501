//! Database module - SQLite store for devices and location samples

mod devices;
mod locations;
mod schema;

use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;

pub use self::schema::{DEVICES_TABLE, LOCATIONS_TABLE};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("Table {table} is missing required column {column}")]
    SchemaMismatch { table: String, column: String },

    #[error("Device row {0} does not exist")]
    UnknownDevice(i64),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// SQLite store holding the single connection used for the process lifetime
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (or create) the database file at `path`
    pub async fn connect(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        tracing::info!("Connecting to db at {}", path.display());

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(false);

        Self::open(options).await
    }

    /// Open an existing database file without write access
    pub async fn connect_read_only(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        tracing::info!("Opening db at {} (read-only)", path.display());

        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .foreign_keys(false);

        Self::open(options).await
    }

    /// Private in-memory database, used by tests and dry runs
    pub async fn connect_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(false);

        Self::open(options).await
    }

    async fn open(options: SqliteConnectOptions) -> StorageResult<Self> {
        // One connection, held until close(); an in-memory database lives
        // exactly as long as its connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LocationSample;

    #[tokio::test]
    async fn test_file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("find_iphone_logger.db");

        let store = Store::connect(&path).await.unwrap();
        store.ensure_schema().await.unwrap();
        let device = store
            .get_or_create_device("Test-Phone", "ext-1", "iPhone")
            .await
            .unwrap();
        store
            .append_location(
                device,
                &LocationSample {
                    timestamp: 1000,
                    location_finished: true,
                    longitude: 10.0,
                    latitude: 20.0,
                    position_type: None,
                    location_type: None,
                    is_old: false,
                    is_inaccurate: false,
                    horizontal_accuracy: 5.0,
                },
            )
            .await
            .unwrap();
        store.close().await;

        let reopened = Store::connect_read_only(&path).await.unwrap();
        assert_eq!(reopened.count_devices().await.unwrap(), 1);
        assert_eq!(reopened.list_locations().await.unwrap()[0].device, device);
        assert!(reopened
            .get_or_create_device("Other", "ext-2", "iPad")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_in_memory_databases_are_private() {
        let first = Store::connect_in_memory().await.unwrap();
        let second = Store::connect_in_memory().await.unwrap();
        first.ensure_schema().await.unwrap();

        assert!(first.table_exists(crate::db::DEVICES_TABLE).await.unwrap());
        assert!(!second.table_exists(crate::db::DEVICES_TABLE).await.unwrap());
    }

    #[tokio::test]
    async fn test_read_only_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Store::connect_read_only(dir.path().join("missing.db")).await;
        assert!(result.is_err());
    }
}
