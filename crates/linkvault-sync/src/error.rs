//! Sync error types.

use crate::ValidationError;
use linkvault_auth::AuthError;
use thiserror::Error;

/// How a failure is presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad input; reported inline and never sent.
    Validation,
    /// No usable session; the caller routes to the landing view.
    Authentication,
    /// Network, authorization or realtime failure; shown as a dismissible message.
    DataOperation,
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Data API answered with a non-success status
    #[error("Data API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Realtime channel refused the join or closed unexpectedly
    #[error("Realtime error: {0}")]
    Realtime(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Operation timed out")]
    Timeout,
}

impl SyncError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SyncError::Validation(_) => ErrorCategory::Validation,
            SyncError::Auth(_) => ErrorCategory::Authentication,
            SyncError::Api { status, .. } if *status == 401 => ErrorCategory::Authentication,
            _ => ErrorCategory::DataOperation,
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
