//! LocationPoller: the fixed-delay poll-and-persist loop
//!
//! One cycle asks the provider for the current fix and appends it to the
//! store. The loop then sleeps for the configured period, measured from the
//! end of the cycle, so the sampling cadence drifts by each cycle's own
//! duration. There is no catch-up and no exit.

use std::time::Duration;

use tokio::time;

use crate::db::Store;
use crate::error::AppError;
use crate::models::Credentials;
use crate::provider::{LocationProvider, ProviderSession};
use crate::session::{DeviceHandle, SessionManager};

/// Result of a single poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Sample stored under this `locations` row id
    Stored(i64),
    /// Provider had no current fix
    NoFix,
    /// Provider or storage failed; logged and skipped
    Failed,
}

pub struct LocationPoller<S> {
    handle: DeviceHandle<S>,
    store: Store,
    device_row_id: i64,
    period: Duration,
}

impl<S: ProviderSession> LocationPoller<S> {
    /// Seed the `devices` row for `handle` (first run only) and build the
    /// poller around it.
    pub async fn new(
        handle: DeviceHandle<S>,
        store: Store,
        period_minutes: u64,
    ) -> Result<Self, AppError> {
        let period = period_minutes
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| {
                AppError::ConfigError(format!(
                    "poll period of {} minutes is out of range",
                    period_minutes
                ))
            })?;

        tracing::info!("[Poller] Getting device row for {}", handle.name());

        let device_row_id = match store.find_device_by_name(handle.name()).await? {
            Some(device) => device.id,
            None => {
                let status = handle.fetch_status().await?;
                store
                    .get_or_create_device(handle.name(), &status.external_id, &status.display_name)
                    .await?
            }
        };

        tracing::info!("[Poller] Device row id: {}", device_row_id);

        Ok(Self {
            handle,
            store,
            device_row_id,
            period,
        })
    }

    pub fn device_row_id(&self) -> i64 {
        self.device_row_id
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run one poll cycle. Never fails: errors are logged and reported as
    /// `CycleOutcome::Failed`.
    pub async fn poll_once(&self) -> CycleOutcome {
        let sample = match self.handle.fetch_location().await {
            Ok(Some(sample)) => sample,
            Ok(None) => {
                tracing::info!("[Poller] Location not found");
                return CycleOutcome::NoFix;
            }
            Err(e) => {
                tracing::warn!("[Poller] Location request for {} failed: {}", self.handle.name(), e);
                return CycleOutcome::Failed;
            }
        };

        tracing::info!("[Poller] Saving device location");
        match self.store.append_location(self.device_row_id, &sample).await {
            Ok(row_id) => {
                let captured = chrono::DateTime::from_timestamp_millis(sample.timestamp)
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| sample.timestamp.to_string());
                tracing::debug!(
                    "[Poller] Stored location {} ({}, {}) captured {}",
                    row_id,
                    sample.latitude,
                    sample.longitude,
                    captured
                );
                CycleOutcome::Stored(row_id)
            }
            Err(e) => {
                tracing::error!("[Poller] Failed to store location: {}", e);
                CycleOutcome::Failed
            }
        }
    }

    /// Start the poll loop (runs forever)
    pub async fn start(self) {
        tracing::info!(
            "[Poller] Running logger for {} (period: {} minutes)",
            self.handle.name(),
            self.period.as_secs() / 60
        );

        loop {
            self.poll_once().await;
            tracing::info!("[Poller] Waiting {} minutes ...", self.period.as_secs() / 60);
            time::sleep(self.period).await;
        }
    }
}

/// Everything the logger does before entering the loop: schema setup,
/// login, device resolution and seeding the device row.
pub async fn prepare<P: LocationProvider>(
    manager: &SessionManager<P>,
    store: Store,
    credentials: &Credentials,
    device_name: Option<&str>,
    period_minutes: u64,
) -> Result<LocationPoller<P::Session>, AppError> {
    store.ensure_schema().await?;
    let session = manager.login(credentials).await?;
    let handle = manager.resolve_device(session, device_name).await?;
    LocationPoller::new(handle, store, period_minutes).await
}

/// Run `prepare` until it succeeds or fails terminally.
///
/// Transient failures after login (a device list that could not be fetched,
/// a locked database) are retried with the manager's login backoff.
pub async fn prepare_with_retry<P: LocationProvider>(
    manager: &SessionManager<P>,
    store: Store,
    credentials: &Credentials,
    device_name: Option<&str>,
    period_minutes: u64,
) -> Result<LocationPoller<P::Session>, AppError> {
    loop {
        match prepare(manager, store.clone(), credentials, device_name, period_minutes).await {
            Ok(poller) => return Ok(poller),
            Err(e) if e.is_terminal() => return Err(e),
            Err(e) => {
                tracing::warn!(
                    "[Poller] Startup failed: {}; retrying in {} seconds",
                    e,
                    manager.login_backoff().as_secs()
                );
                time::sleep(manager.login_backoff()).await;
            }
        }
    }
}
