//! `locations` table access (append-only)

use crate::models::{LocationSample, StoredLocation};

use super::{StorageError, StorageResult, Store};

impl Store {
    /// Append one sample for the device row `device_row_id`.
    ///
    /// Foreign keys are not enforced on the connection, so the device is
    /// checked inside the insert itself.
    pub async fn append_location(
        &self,
        device_row_id: i64,
        sample: &LocationSample,
    ) -> StorageResult<i64> {
        validate_sample(sample)?;

        let result = sqlx::query(
            r#"
            INSERT INTO locations (device, timeStamp, locationFinished, longitude, positionType,
                                   locationType, latitude, isOld, horizontalAccuracy, isInaccurate)
            SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
            WHERE EXISTS (SELECT 1 FROM devices WHERE id = ?)
            "#,
        )
        .bind(device_row_id)
        .bind(sample.timestamp)
        .bind(sample.location_finished)
        .bind(sample.longitude)
        .bind(&sample.position_type)
        .bind(&sample.location_type)
        .bind(sample.latitude)
        .bind(sample.is_old)
        .bind(sample.horizontal_accuracy)
        .bind(sample.is_inaccurate)
        .bind(device_row_id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::UnknownDevice(device_row_id));
        }

        Ok(result.last_insert_rowid())
    }

    /// All stored samples in insertion order
    pub async fn list_locations(&self) -> StorageResult<Vec<StoredLocation>> {
        let rows = sqlx::query_as::<_, StoredLocation>(
            r#"
            SELECT id, device, timeStamp, locationFinished, longitude, positionType,
                   locationType, latitude, isOld, isInaccurate, horizontalAccuracy
            FROM locations
            ORDER BY id ASC
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    pub async fn count_locations(&self) -> StorageResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM locations")
            .fetch_one(self.pool())
            .await?;

        Ok(count)
    }
}

fn validate_sample(sample: &LocationSample) -> StorageResult<()> {
    for (field, value) in [
        ("longitude", sample.longitude),
        ("latitude", sample.latitude),
        ("horizontalAccuracy", sample.horizontal_accuracy),
    ] {
        if !value.is_finite() {
            return Err(StorageError::InvalidValue {
                field,
                reason: format!("{} is not a finite number", value),
            });
        }
    }

    Ok(())
}
