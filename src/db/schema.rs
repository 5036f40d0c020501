//! Schema setup for the `devices` and `locations` tables
//!
//! Both tables are created on first use and validated on every startup.
//! Column names are shared with the viewer and with databases written by
//! earlier versions, so their spelling is fixed.

use sqlx::Row;

use super::{StorageError, StorageResult, Store};

pub const DEVICES_TABLE: &str = "devices";
pub const LOCATIONS_TABLE: &str = "locations";

const DEVICES_DDL: &str = r#"
    CREATE TABLE devices (
        id INTEGER PRIMARY KEY NOT NULL,
        device_id VARCHAR NOT NULL,
        display_name VARCHAR NOT NULL,
        name VARCHAR NOT NULL
    )
"#;

const LOCATIONS_DDL: &str = r#"
    CREATE TABLE locations (
        id INTEGER PRIMARY KEY NOT NULL,
        device INTEGER NOT NULL,
        timeStamp INTEGER NOT NULL,
        locationFinished INTEGER NOT NULL,
        longitude REAL NOT NULL,
        positionType VARCHAR,
        locationType VARCHAR,
        latitude REAL NOT NULL,
        isOld INTEGER NOT NULL,
        isInaccurate INTEGER NOT NULL,
        horizontalAccuracy REAL NOT NULL,
        -- Targets the surrogate devices.id. Not enforced: foreign_keys is
        -- off, and append_location checks the device row itself.
        FOREIGN KEY(device) REFERENCES devices(id) ON DELETE CASCADE
    )
"#;

const DEVICES_COLUMNS: &[&str] = &["id", "device_id", "display_name", "name"];

const LOCATIONS_COLUMNS: &[&str] = &[
    "id",
    "device",
    "timeStamp",
    "locationFinished",
    "longitude",
    "positionType",
    "locationType",
    "latitude",
    "isOld",
    "isInaccurate",
    "horizontalAccuracy",
];

impl Store {
    /// Ensure both tables exist and carry every required column.
    ///
    /// Safe to call on every startup: existing tables and rows are left alone.
    pub async fn ensure_schema(&self) -> StorageResult<()> {
        for (table, ddl, columns) in [
            (DEVICES_TABLE, DEVICES_DDL, DEVICES_COLUMNS),
            (LOCATIONS_TABLE, LOCATIONS_DDL, LOCATIONS_COLUMNS),
        ] {
            if self.table_exists(table).await? {
                tracing::debug!("Table {} already exists", table);
            } else {
                sqlx::query(ddl).execute(self.pool()).await?;
                tracing::info!("Created table {}", table);
            }
            self.validate_columns(table, columns).await?;
        }

        Ok(())
    }

    pub async fn table_exists(&self, table: &str) -> StorageResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(self.pool())
        .await?;

        Ok(count > 0)
    }

    async fn validate_columns(&self, table: &str, required: &[&str]) -> StorageResult<()> {
        // PRAGMA arguments cannot be bound; `table` only ever comes from the
        // constants above.
        let rows = sqlx::query(&format!("PRAGMA table_info({})", table))
            .fetch_all(self.pool())
            .await?;

        let present: Vec<String> = rows
            .iter()
            .map(|row| row.try_get::<String, _>("name"))
            .collect::<Result<_, _>>()?;

        for column in required {
            if !present.iter().any(|p| p.eq_ignore_ascii_case(column)) {
                return Err(StorageError::SchemaMismatch {
                    table: table.to_string(),
                    column: column.to_string(),
                });
            }
        }

        Ok(())
    }
}
