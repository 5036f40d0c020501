//! Command line arguments for the two binaries

use clap::Parser;

use crate::config::{Config, MAX_PERIOD_MINUTES};
use crate::models::Credentials;

#[derive(Parser, Debug)]
#[command(name = "find-device-logger")]
#[command(about = "Periodically log a device's location to SQLite")]
#[command(version)]
pub struct LoggerArgs {
    /// Username for the location service
    #[arg(short = 'u', value_name = "USERNAME")]
    pub username: String,

    /// Password for the location service
    #[arg(short = 'p', value_name = "PASSWORD", env = "FINDDEVICE_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Time between location requests (minutes)
    #[arg(short = 's', value_name = "MINUTES", value_parser = clap::value_parser!(u64).range(1..=MAX_PERIOD_MINUTES))]
    pub request_period: Option<u64>,

    /// Device name (default: the account's primary device)
    #[arg(short = 'n', value_name = "DEVICE_NAME")]
    pub device_name: Option<String>,

    /// SQLite database file
    #[arg(long = "db", value_name = "PATH")]
    pub db: Option<String>,

    /// Config file (default: config/default, optional)
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<String>,
}

impl LoggerArgs {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    /// Flags override file and environment settings
    pub fn apply(&self, config: &mut Config) {
        if let Some(period) = self.request_period {
            config.poll.period_minutes = period;
        }
        if let Some(db) = &self.db {
            config.database.path = db.clone();
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "find-device-viewer")]
#[command(about = "Serve stored locations on a map")]
#[command(version)]
pub struct ViewerArgs {
    /// SQLite database file written by find-device-logger
    #[arg(long = "db", value_name = "PATH")]
    pub db: Option<String>,

    /// Address to listen on
    #[arg(long = "listen", value_name = "ADDR")]
    pub listen: Option<String>,

    /// Config file (default: config/default, optional)
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<String>,
}

impl ViewerArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(db) = &self.db {
            config.database.path = db.clone();
        }
        if let Some(listen) = &self.listen {
            config.viewer.listen = listen.clone();
        }
    }
}
