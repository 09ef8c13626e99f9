//! Storage key constants.

/// Storage keys used by the session store
pub struct StorageKeys;

impl StorageKeys {
    /// Access token of the current session
    pub const SESSION_ACCESS_TOKEN: &'static str = "session_access_token";

    /// Refresh token of the current session
    pub const SESSION_REFRESH_TOKEN: &'static str = "session_refresh_token";

    /// Session metadata (JSON): identity and expiry
    pub const SESSION_META: &'static str = "session_meta";

    /// PKCE code verifier of an in-flight sign-in
    pub const PKCE_CODE_VERIFIER: &'static str = "pkce_code_verifier";
}
