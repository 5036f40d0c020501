//! find-device-logger
//!
//! Polls a device-location service at a fixed interval, appends each fix to
//! a local SQLite file, and serves the stored track on a map.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod poller;
pub mod provider;
pub mod session;
pub mod viewer;
