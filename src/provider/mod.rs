//! Remote location provider integration
//!
//! - `icloud`: HTTP client for the iCloud Find My web service
//!
//! The rest of the crate depends only on the two traits below: authenticate,
//! then list devices and ask one device for its status or location.

pub mod icloud;

pub use icloud::ICloudProvider;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Credentials, DeviceStatus, LocationSample, RemoteDevice};

#[derive(Error, Debug)]
pub enum ProviderError {
    /// The provider definitively rejected the username/password pair
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Http(u16),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Unknown device id {0}")]
    UnknownDevice(String),
}

impl ProviderError {
    /// Whether waiting and retrying can change the outcome
    pub fn is_transient(&self) -> bool {
        !matches!(self, ProviderError::InvalidCredentials)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProviderError::InvalidResponse(e.to_string())
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}

/// Entry point of a provider: turns credentials into a session
#[async_trait]
pub trait LocationProvider: Send + Sync {
    type Session: ProviderSession;

    async fn authenticate(&self, credentials: &Credentials)
        -> Result<Self::Session, ProviderError>;

    /// Get the provider name
    fn name(&self) -> &'static str;
}

/// An authenticated session
#[async_trait]
pub trait ProviderSession: Send + Sync {
    /// Name of the account's primary device, if the account has any device
    fn primary_device_name(&self) -> Option<String>;

    async fn list_devices(&self) -> Result<Vec<RemoteDevice>, ProviderError>;

    async fn status(&self, device_id: &str) -> Result<DeviceStatus, ProviderError>;

    /// Current fix, or `None` when the provider has none
    async fn location(&self, device_id: &str) -> Result<Option<LocationSample>, ProviderError>;
}
