//! Data models for find-device-logger

use serde::{Deserialize, Serialize};

// ============================================================================
// Stored Models
// ============================================================================

/// Row of the `devices` table
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Device {
    pub id: i64,
    /// Provider's device identifier
    #[sqlx(rename = "device_id")]
    pub external_id: String,
    pub display_name: String,
    pub name: String,
}

/// One location fix as reported by the provider.
///
/// `timestamp` is the provider capture time in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    #[serde(rename = "timeStamp")]
    pub timestamp: i64,
    pub location_finished: bool,
    pub longitude: f64,
    pub latitude: f64,
    pub position_type: Option<String>,
    pub location_type: Option<String>,
    pub is_old: bool,
    pub is_inaccurate: bool,
    pub horizontal_accuracy: f64,
}

/// Row of the `locations` table, as served to the viewer
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StoredLocation {
    pub id: i64,
    pub device: i64,
    #[sqlx(rename = "timeStamp")]
    #[serde(rename = "timeStamp")]
    pub timestamp: i64,
    #[sqlx(rename = "locationFinished")]
    pub location_finished: bool,
    pub longitude: f64,
    #[sqlx(rename = "positionType")]
    pub position_type: Option<String>,
    #[sqlx(rename = "locationType")]
    pub location_type: Option<String>,
    pub latitude: f64,
    #[sqlx(rename = "isOld")]
    pub is_old: bool,
    #[sqlx(rename = "isInaccurate")]
    pub is_inaccurate: bool,
    #[sqlx(rename = "horizontalAccuracy")]
    pub horizontal_accuracy: f64,
}

impl StoredLocation {
    pub fn sample(&self) -> LocationSample {
        LocationSample {
            timestamp: self.timestamp,
            location_finished: self.location_finished,
            longitude: self.longitude,
            latitude: self.latitude,
            position_type: self.position_type.clone(),
            location_type: self.location_type.clone(),
            is_old: self.is_old,
            is_inaccurate: self.is_inaccurate,
            horizontal_accuracy: self.horizontal_accuracy,
        }
    }
}

// ============================================================================
// Provider Models
// ============================================================================

/// A device as listed by the provider session
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDevice {
    pub id: String,
    pub name: String,
}

/// Identity fields used to seed a `devices` row
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceStatus {
    pub external_id: String,
    pub display_name: String,
    pub name: String,
}

/// Login credentials for the provider
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}
