//! Error handling module

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::db::StorageError;
use crate::provider::ProviderError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid credentials for {0}")]
    InvalidCredentials(String),

    #[error("No device with name \"{0}\" in provider profile")]
    DeviceNotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    /// Errors that must stop the process instead of being retried or skipped
    pub fn is_terminal(&self) -> bool {
        match self {
            AppError::InvalidCredentials(_)
            | AppError::DeviceNotFound(_)
            | AppError::ConfigError(_) => true,
            AppError::Storage(e) => matches!(e, StorageError::SchemaMismatch { .. }),
            AppError::Provider(e) => !e.is_transient(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::InvalidCredentials(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::DeviceNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Storage(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::Provider(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            AppError::ConfigError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(serde_json::json!({
            "error": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}
