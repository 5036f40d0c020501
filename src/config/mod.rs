//! Configuration module
//!
//! Sources, lowest precedence first: built-in defaults, `config/default`
//! (or the file passed with `--config`), `FINDDEVICE__*` environment
//! variables. Command line flags are applied on top by the binaries.

use serde::Deserialize;

use crate::error::AppError;

/// Longest accepted poll period (one year)
pub const MAX_PERIOD_MINUTES: u64 = 60 * 24 * 365;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub viewer: ViewerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    /// Delay between the end of one poll and the start of the next
    #[serde(default = "default_period_minutes")]
    pub period_minutes: u64,
    #[serde(default = "default_login_backoff_secs")]
    pub login_backoff_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_setup_url")]
    pub setup_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file, appended to
    #[serde(default)]
    pub file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            period_minutes: default_period_minutes(),
            login_backoff_secs: default_login_backoff_secs(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            setup_url: default_setup_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_db_path() -> String {
    "find_iphone_logger.db".to_string()
}

fn default_period_minutes() -> u64 {
    10
}

fn default_login_backoff_secs() -> u64 {
    20
}

fn default_setup_url() -> String {
    "https://setup.icloud.com/setup/ws/1".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_listen() -> String {
    "127.0.0.1:5000".to_string()
}

impl Config {
    /// Load from `config/default` (or `file`) and the environment.
    ///
    /// An explicitly named file must exist; the default one is optional.
    pub fn load(file: Option<&str>) -> anyhow::Result<Self> {
        let file_source = match file {
            Some(path) => config::File::with_name(path).required(true),
            None => config::File::with_name("config/default").required(false),
        };

        let settings = config::Config::builder()
            .add_source(file_source)
            .add_source(config::Environment::with_prefix("FINDDEVICE").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !(1..=MAX_PERIOD_MINUTES).contains(&self.poll.period_minutes) {
            return Err(AppError::ConfigError(format!(
                "poll.period_minutes must be between 1 and {}, got {}",
                MAX_PERIOD_MINUTES, self.poll.period_minutes
            )));
        }
        if self.provider.timeout_secs == 0 {
            return Err(AppError::ConfigError(
                "provider.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
