//! `devices` table access

use crate::models::Device;

use super::{StorageResult, Store};

impl Store {
    /// Get a device row by its user-visible name
    pub async fn find_device_by_name(&self, name: &str) -> StorageResult<Option<Device>> {
        let row = sqlx::query_as::<_, Device>(
            r#"
            SELECT id, device_id, display_name, name
            FROM devices
            WHERE name = ?
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(name)
        .fetch_optional(self.pool())
        .await?;

        Ok(row)
    }

    /// Return the surrogate id of the device called `name`, inserting it first
    /// if absent. Existing rows are never updated.
    ///
    /// Uniqueness rests on the prior lookup, so callers must not race on the
    /// same name.
    pub async fn get_or_create_device(
        &self,
        name: &str,
        external_id: &str,
        display_name: &str,
    ) -> StorageResult<i64> {
        if let Some(device) = self.find_device_by_name(name).await? {
            tracing::debug!("Device {} already stored as row {}", name, device.id);
            return Ok(device.id);
        }

        sqlx::query(
            r#"
            INSERT INTO devices (device_id, display_name, name)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(external_id)
        .bind(display_name)
        .bind(name)
        .execute(self.pool())
        .await?;

        let device = self
            .find_device_by_name(name)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        tracing::info!("Stored new device {} as row {}", name, device.id);
        Ok(device.id)
    }

    pub async fn list_devices(&self) -> StorageResult<Vec<Device>> {
        let rows = sqlx::query_as::<_, Device>(
            "SELECT id, device_id, display_name, name FROM devices ORDER BY id ASC",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    pub async fn count_devices(&self) -> StorageResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM devices")
            .fetch_one(self.pool())
            .await?;

        Ok(count)
    }
}
