//! SessionManager: login with retry, device resolution, and the two
//! per-device queries the poller needs.

use std::time::Duration;

use tokio::time;

use crate::error::AppError;
use crate::models::{Credentials, DeviceStatus, LocationSample, RemoteDevice};
use crate::provider::{LocationProvider, ProviderError, ProviderSession};

/// A device resolved by name inside an authenticated session
pub struct DeviceHandle<S> {
    session: S,
    device: RemoteDevice,
}

impl<S> DeviceHandle<S> {
    pub fn name(&self) -> &str {
        &self.device.name
    }

    pub fn external_id(&self) -> &str {
        &self.device.id
    }
}

pub struct SessionManager<P> {
    provider: P,
    login_backoff: Duration,
}

impl<P: LocationProvider> SessionManager<P> {
    pub fn new(provider: P, login_backoff: Duration) -> Self {
        Self {
            provider,
            login_backoff,
        }
    }

    pub fn login_backoff(&self) -> Duration {
        self.login_backoff
    }

    /// Authenticate, retrying transient failures forever with a fixed backoff.
    ///
    /// Rejected credentials end the loop immediately.
    pub async fn login(&self, credentials: &Credentials) -> Result<P::Session, AppError> {
        let mut attempt: u64 = 0;

        loop {
            attempt += 1;
            tracing::info!(
                "[Session] Connecting to {} as {} (attempt {})",
                self.provider.name(),
                credentials.username,
                attempt
            );

            match self.provider.authenticate(credentials).await {
                Ok(session) => return Ok(session),
                Err(ProviderError::InvalidCredentials) => {
                    tracing::error!(
                        "[Session] {} rejected the credentials for {}",
                        self.provider.name(),
                        credentials.username
                    );
                    return Err(AppError::InvalidCredentials(credentials.username.clone()));
                }
                Err(e) => {
                    tracing::warn!(
                        "[Session] Login failed: {}; retrying in {} seconds",
                        e,
                        self.login_backoff.as_secs()
                    );
                    time::sleep(self.login_backoff).await;
                }
            }
        }
    }

    /// Find the device called `requested_name`, or the account's primary
    /// device when no name is given.
    pub async fn resolve_device(
        &self,
        session: P::Session,
        requested_name: Option<&str>,
    ) -> Result<DeviceHandle<P::Session>, AppError> {
        tracing::info!("[Session] Finding device in {}", self.provider.name());

        let name = match requested_name {
            Some(name) => name.to_string(),
            None => session.primary_device_name().ok_or_else(|| {
                AppError::DeviceNotFound("<primary device>".to_string())
            })?,
        };

        let device = session
            .list_devices()
            .await?
            .into_iter()
            .find(|d| d.name == name)
            .ok_or_else(|| AppError::DeviceNotFound(name.clone()))?;

        tracing::info!("[Session] Resolved device {} ({})", device.name, device.id);
        Ok(DeviceHandle { session, device })
    }
}

impl<S: ProviderSession> DeviceHandle<S> {
    /// Identity fields for the `devices` row
    pub async fn fetch_status(&self) -> Result<DeviceStatus, AppError> {
        Ok(self.session.status(&self.device.id).await?)
    }

    /// Current fix, `None` when the provider has none
    pub async fn fetch_location(&self) -> Result<Option<LocationSample>, AppError> {
        Ok(self.session.location(&self.device.id).await?)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted provider used by the session and poller tests

    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;

    #[derive(Clone, Default)]
    pub struct ScriptedProvider {
        pub logins: Arc<Mutex<VecDeque<Result<(), ProviderError>>>>,
        pub login_attempts: Arc<Mutex<Vec<time::Instant>>>,
        pub devices: Vec<RemoteDevice>,
        pub list_failures: Arc<Mutex<VecDeque<ProviderError>>>,
        pub locations: Arc<Mutex<VecDeque<Option<LocationSample>>>>,
        pub location_calls: Arc<Mutex<Vec<time::Instant>>>,
    }

    pub struct ScriptedSession {
        provider: ScriptedProvider,
    }

    impl ScriptedProvider {
        pub fn with_devices(names: &[&str]) -> Self {
            Self {
                devices: names
                    .iter()
                    .enumerate()
                    .map(|(i, name)| RemoteDevice {
                        id: format!("ext-{}", i + 1),
                        name: name.to_string(),
                    })
                    .collect(),
                ..Default::default()
            }
        }

        pub fn script_logins(&self, results: Vec<Result<(), ProviderError>>) {
            self.logins.lock().unwrap().extend(results);
        }

        pub fn script_list_failures(&self, failures: Vec<ProviderError>) {
            self.list_failures.lock().unwrap().extend(failures);
        }

        pub fn script_locations(&self, results: Vec<Option<LocationSample>>) {
            self.locations.lock().unwrap().extend(results);
        }
    }

    #[async_trait]
    impl LocationProvider for ScriptedProvider {
        type Session = ScriptedSession;

        async fn authenticate(
            &self,
            _credentials: &Credentials,
        ) -> Result<ScriptedSession, ProviderError> {
            self.login_attempts.lock().unwrap().push(time::Instant::now());
            let next = self.logins.lock().unwrap().pop_front().unwrap_or(Ok(()));
            next.map(|_| ScriptedSession {
                provider: self.clone(),
            })
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    #[async_trait]
    impl ProviderSession for ScriptedSession {
        fn primary_device_name(&self) -> Option<String> {
            self.provider.devices.first().map(|d| d.name.clone())
        }

        async fn list_devices(&self) -> Result<Vec<RemoteDevice>, ProviderError> {
            match self.provider.list_failures.lock().unwrap().pop_front() {
                Some(e) => Err(e),
                None => Ok(self.provider.devices.clone()),
            }
        }

        async fn status(&self, device_id: &str) -> Result<DeviceStatus, ProviderError> {
            let device = self
                .provider
                .devices
                .iter()
                .find(|d| d.id == device_id)
                .ok_or_else(|| ProviderError::UnknownDevice(device_id.to_string()))?;
            Ok(DeviceStatus {
                external_id: device.id.clone(),
                display_name: format!("{} display", device.name),
                name: device.name.clone(),
            })
        }

        async fn location(
            &self,
            _device_id: &str,
        ) -> Result<Option<LocationSample>, ProviderError> {
            self.provider
                .location_calls
                .lock()
                .unwrap()
                .push(time::Instant::now());
            Ok(self.provider.locations.lock().unwrap().pop_front().flatten())
        }
    }

    /// Formatted log output captured for the current thread
    #[derive(Clone, Default)]
    pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    pub fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (buffer, guard)
    }

    pub fn credentials() -> Credentials {
        Credentials {
            username: "user@example.com".to_string(),
            password: "secret".to_string(),
        }
    }

    pub fn sample(timestamp: i64) -> LocationSample {
        LocationSample {
            timestamp,
            location_finished: true,
            longitude: 10.0,
            latitude: 20.0,
            position_type: Some("x".to_string()),
            location_type: Some("y".to_string()),
            is_old: false,
            is_inaccurate: false,
            horizontal_accuracy: 5.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_login_retries_transient_failures_with_backoff() {
        let provider = ScriptedProvider::with_devices(&["Phone"]);
        provider.script_logins(vec![
            Err(ProviderError::Transport("connection reset".into())),
            Err(ProviderError::Http(503)),
            Ok(()),
        ]);
        let manager = SessionManager::new(provider.clone(), Duration::from_secs(20));

        let start = time::Instant::now();
        let result = manager.login(&credentials()).await;

        assert!(result.is_ok());
        let attempts = provider.login_attempts.lock().unwrap().clone();
        assert_eq!(attempts.len(), 3);
        assert_eq!(attempts[1] - attempts[0], Duration::from_secs(20));
        assert_eq!(attempts[2] - attempts[1], Duration::from_secs(20));
        assert_eq!(start.elapsed(), Duration::from_secs(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_credentials_are_terminal() {
        let provider = ScriptedProvider::with_devices(&["Phone"]);
        provider.script_logins(vec![
            Err(ProviderError::Transport("timeout".into())),
            Err(ProviderError::InvalidCredentials),
            Ok(()),
        ]);
        let manager = SessionManager::new(provider.clone(), Duration::from_secs(20));

        let err = manager.login(&credentials()).await.err().unwrap();

        assert!(matches!(err, AppError::InvalidCredentials(ref user) if user == "user@example.com"));
        assert!(err.is_terminal());
        assert_eq!(provider.login_attempts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_named_device() {
        let provider = ScriptedProvider::with_devices(&["Phone", "Test-Phone"]);
        let manager = SessionManager::new(provider, Duration::from_secs(20));
        let session = manager.login(&credentials()).await.unwrap();

        let handle = manager
            .resolve_device(session, Some("Test-Phone"))
            .await
            .unwrap();

        assert_eq!(handle.name(), "Test-Phone");
        assert_eq!(handle.external_id(), "ext-2");
        let status = handle.fetch_status().await.unwrap();
        assert_eq!(status.external_id, "ext-2");
        assert_eq!(status.name, "Test-Phone");
    }

    #[tokio::test]
    async fn test_resolve_defaults_to_primary_device() {
        let provider = ScriptedProvider::with_devices(&["Primary", "Other"]);
        let manager = SessionManager::new(provider, Duration::from_secs(20));
        let session = manager.login(&credentials()).await.unwrap();

        let handle = manager.resolve_device(session, None).await.unwrap();

        assert_eq!(handle.name(), "Primary");
    }

    #[tokio::test]
    async fn test_unknown_device_is_not_found() {
        let provider = ScriptedProvider::with_devices(&["Phone"]);
        let manager = SessionManager::new(provider, Duration::from_secs(20));
        let session = manager.login(&credentials()).await.unwrap();

        let err = manager
            .resolve_device(session, Some("Missing"))
            .await
            .err()
            .unwrap();

        assert!(matches!(err, AppError::DeviceNotFound(ref name) if name == "Missing"));
        assert!(err.is_terminal());
    }

    #[tokio::test]
    async fn test_empty_profile_has_no_primary_device() {
        let provider = ScriptedProvider::with_devices(&[]);
        let manager = SessionManager::new(provider, Duration::from_secs(20));
        let session = manager.login(&credentials()).await.unwrap();

        let err = manager.resolve_device(session, None).await.err().unwrap();

        assert!(matches!(err, AppError::DeviceNotFound(_)));
    }

    #[tokio::test]
    async fn test_log_lines_name_the_session_component() {
        let provider = ScriptedProvider::with_devices(&["Phone"]);
        provider.script_logins(vec![Err(ProviderError::InvalidCredentials)]);
        let manager = SessionManager::new(provider, Duration::from_secs(20));
        let (logs, _guard) = capture_logs();

        assert!(manager.login(&credentials()).await.is_err());

        let output = logs.contents();
        assert!(output.contains("[Session] Connecting to scripted"), "{}", output);
        assert!(output.contains("[Session] scripted rejected the credentials"), "{}", output);
    }

    #[tokio::test]
    async fn test_fetch_location_passes_through_absent_fix() {
        let provider = ScriptedProvider::with_devices(&["Phone"]);
        provider.script_locations(vec![Some(sample(1000)), None]);
        let manager = SessionManager::new(provider, Duration::from_secs(20));
        let session = manager.login(&credentials()).await.unwrap();
        let handle = manager.resolve_device(session, None).await.unwrap();

        assert_eq!(handle.fetch_location().await.unwrap(), Some(sample(1000)));
        assert_eq!(handle.fetch_location().await.unwrap(), None);
    }
}
