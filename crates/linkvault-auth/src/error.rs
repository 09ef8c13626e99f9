//! Errors raised while signing in or keeping the session alive.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// Provider redirect or callback error
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// The one-time authorization code could not be redeemed
    #[error("Code exchange failed: {0}")]
    CodeExchange(String),

    /// No PKCE verifier stored for the sign-in being completed
    #[error("No sign-in in progress (missing code verifier)")]
    MissingCodeVerifier,

    /// Token refresh rejected
    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    /// Every transient refresh attempt failed.
    #[error("Token refresh failed after {0} attempts")]
    RefreshExhausted(u32),

    #[error("Not logged in")]
    NotLoggedIn,

    /// The server no longer accepts the stored tokens.
    #[error("Session invalid: {0}")]
    SessionInvalid(String),

    /// Auth service answered with an unexpected status
    #[error("Auth service error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Invalid auth state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Storage error: {0}")]
    Storage(#[from] linkvault_storage::StorageError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Operation timed out")]
    Timeout,

    #[error("Network unavailable")]
    NetworkUnavailable,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Whether retrying the same request may succeed: connection failures,
    /// timeouts and 5xx answers.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::NetworkUnavailable | AuthError::Timeout => true,
            AuthError::Server { status, .. } => *status >= 500,
            AuthError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                e.status().is_some_and(|s| s.is_server_error())
            }
            _ => false,
        }
    }
}

impl From<linkvault_config_and_utils::CoreError> for AuthError {
    fn from(err: linkvault_config_and_utils::CoreError) -> Self {
        AuthError::Config(err.to_string())
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
