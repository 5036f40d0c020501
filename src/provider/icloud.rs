//! iCloud Find My web client
//!
//! Login goes through the setup service, which hands back the Find My
//! endpoint; every device query afterwards is a `refreshClient` call that
//! returns the whole device list with each device's last known location.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;

use super::{LocationProvider, ProviderError, ProviderSession};
use crate::config::ProviderConfig;
use crate::models::{Credentials, DeviceStatus, LocationSample, RemoteDevice};

const CLIENT_BUILD_NUMBER: &str = "2021Project52";
const CLIENT_ID: &str = "find-device-logger";
const ORIGIN: &str = "https://www.icloud.com";

pub struct ICloudProvider {
    http_client: Client,
    setup_url: String,
}

pub struct ICloudSession {
    http_client: Client,
    setup_url: String,
    credentials: Credentials,
    endpoints: RwLock<Endpoints>,
    devices: RwLock<Vec<ICloudDevice>>,
    primary_name: Option<String>,
}

#[derive(Debug, Clone)]
struct Endpoints {
    findme_url: String,
    dsid: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    ds_info: DsInfo,
    #[serde(default)]
    webservices: HashMap<String, Webservice>,
}

#[derive(Debug, Deserialize)]
struct DsInfo {
    #[serde(deserialize_with = "string_or_number")]
    dsid: String,
}

#[derive(Debug, Deserialize)]
struct Webservice {
    url: String,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    content: Vec<ICloudDevice>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ICloudDevice {
    id: String,
    name: String,
    device_display_name: Option<String>,
    device_status: Option<String>,
    battery_level: Option<f64>,
    location: Option<RawLocation>,
}

/// Location object as sent by Find My; every field may be missing while a
/// fix is still being resolved.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLocation {
    time_stamp: Option<i64>,
    location_finished: Option<bool>,
    longitude: Option<f64>,
    latitude: Option<f64>,
    position_type: Option<String>,
    location_type: Option<String>,
    is_old: Option<bool>,
    is_inaccurate: Option<bool>,
    horizontal_accuracy: Option<f64>,
}

impl RawLocation {
    fn into_sample(self) -> Result<LocationSample, &'static str> {
        Ok(LocationSample {
            timestamp: self.time_stamp.ok_or("timeStamp")?,
            location_finished: self.location_finished.ok_or("locationFinished")?,
            longitude: self.longitude.ok_or("longitude")?,
            latitude: self.latitude.ok_or("latitude")?,
            position_type: self.position_type,
            location_type: self.location_type,
            is_old: self.is_old.ok_or("isOld")?,
            is_inaccurate: self.is_inaccurate.ok_or("isInaccurate")?,
            horizontal_accuracy: self.horizontal_accuracy.ok_or("horizontalAccuracy")?,
        })
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

impl ICloudProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            http_client: build_client(config)?,
            setup_url: config.setup_url.trim_end_matches('/').to_string(),
        })
    }
}

fn build_client(config: &ProviderConfig) -> Result<Client, ProviderError> {
    Client::builder()
        .cookie_store(true)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| ProviderError::Transport(format!("Failed to create HTTP client: {}", e)))
}

/// POST the login form and extract the Find My endpoint
async fn login(
    http_client: &Client,
    setup_url: &str,
    credentials: &Credentials,
) -> Result<Endpoints, ProviderError> {
    let url = format!("{}/login", setup_url);

    let body = serde_json::json!({
        "apple_id": credentials.username,
        "password": credentials.password,
        "extended_login": false
    });

    let resp = http_client
        .post(&url)
        .query(&[("clientBuildNumber", CLIENT_BUILD_NUMBER), ("clientId", CLIENT_ID)])
        .header("Origin", ORIGIN)
        .header("Referer", format!("{}/", ORIGIN))
        .json(&body)
        .send()
        .await?;

    match resp.status().as_u16() {
        401 | 403 | 421 => return Err(ProviderError::InvalidCredentials),
        code if !resp.status().is_success() => return Err(ProviderError::Http(code)),
        _ => {}
    }

    let result: LoginResponse = resp.json().await?;

    let findme_url = result
        .webservices
        .get("findme")
        .map(|ws| ws.url.trim_end_matches('/').to_string())
        .ok_or_else(|| ProviderError::InvalidResponse("No findme webservice in login response".into()))?;

    Ok(Endpoints {
        findme_url,
        dsid: result.ds_info.dsid,
    })
}

#[async_trait]
impl LocationProvider for ICloudProvider {
    type Session = ICloudSession;

    async fn authenticate(&self, credentials: &Credentials) -> Result<ICloudSession, ProviderError> {
        let endpoints = login(&self.http_client, &self.setup_url, credentials).await?;
        tracing::debug!("[iCloud] Find My endpoint: {}", endpoints.findme_url);

        let session = ICloudSession {
            http_client: self.http_client.clone(),
            setup_url: self.setup_url.clone(),
            credentials: credentials.clone(),
            endpoints: RwLock::new(endpoints),
            devices: RwLock::new(Vec::new()),
            primary_name: None,
        };

        let devices = session.refresh().await?;
        tracing::info!("[iCloud] Logged in, {} devices in profile", devices.len());

        Ok(ICloudSession {
            primary_name: devices.first().map(|d| d.name.clone()),
            ..session
        })
    }

    fn name(&self) -> &'static str {
        "iCloud"
    }
}

impl ICloudSession {
    /// Fetch the device list, logging in again once if the session expired
    async fn refresh(&self) -> Result<Vec<ICloudDevice>, ProviderError> {
        let devices = match self.refresh_client().await {
            Err(ProviderError::Http(code)) if is_session_expired(code) => {
                tracing::warn!("[iCloud] Session expired (HTTP {}), logging in again", code);
                let endpoints = login(&self.http_client, &self.setup_url, &self.credentials).await?;
                *self.endpoints.write().await = endpoints;
                self.refresh_client().await?
            }
            other => other?,
        };

        *self.devices.write().await = devices.clone();
        Ok(devices)
    }

    async fn refresh_client(&self) -> Result<Vec<ICloudDevice>, ProviderError> {
        let endpoints = self.endpoints.read().await.clone();
        let url = format!(
            "{}/fmipservice/client/web/refreshClient",
            endpoints.findme_url
        );

        let body = serde_json::json!({
            "clientContext": {
                "fmly": true,
                "shouldLocate": true,
                "selectedDevice": "all"
            }
        });

        let resp = self
            .http_client
            .post(&url)
            .query(&[
                ("clientBuildNumber", CLIENT_BUILD_NUMBER),
                ("clientId", CLIENT_ID),
                ("dsid", endpoints.dsid.as_str()),
            ])
            .header("Origin", ORIGIN)
            .header("Referer", format!("{}/", ORIGIN))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ProviderError::Http(resp.status().as_u16()));
        }

        let result: RefreshResponse = resp.json().await?;
        Ok(result.content)
    }

    async fn find_device(&self, device_id: &str) -> Result<ICloudDevice, ProviderError> {
        self.refresh()
            .await?
            .into_iter()
            .find(|d| d.id == device_id)
            .ok_or_else(|| ProviderError::UnknownDevice(device_id.to_string()))
    }
}

fn is_session_expired(code: u16) -> bool {
    matches!(code, 401 | 421 | 450)
}

#[async_trait]
impl ProviderSession for ICloudSession {
    fn primary_device_name(&self) -> Option<String> {
        self.primary_name.clone()
    }

    async fn list_devices(&self) -> Result<Vec<RemoteDevice>, ProviderError> {
        let cached = self.devices.read().await.clone();
        let devices = if cached.is_empty() {
            self.refresh().await?
        } else {
            cached
        };

        Ok(devices
            .into_iter()
            .map(|d| RemoteDevice { id: d.id, name: d.name })
            .collect())
    }

    async fn status(&self, device_id: &str) -> Result<DeviceStatus, ProviderError> {
        let device = self.find_device(device_id).await?;
        tracing::debug!(
            "[iCloud] Status for {}: {:?}, battery {:?}",
            device.name,
            device.device_status,
            device.battery_level
        );

        Ok(DeviceStatus {
            external_id: device.id,
            display_name: device.device_display_name.unwrap_or_default(),
            name: device.name,
        })
    }

    async fn location(&self, device_id: &str) -> Result<Option<LocationSample>, ProviderError> {
        let device = self.find_device(device_id).await?;

        let Some(raw) = device.location else {
            return Ok(None);
        };

        match raw.into_sample() {
            Ok(sample) => Ok(Some(sample)),
            Err(field) => {
                tracing::warn!(
                    "[iCloud] Location for {} is missing {}, treating as no fix",
                    device.name,
                    field
                );
                Ok(None)
            }
        }
    }
}
