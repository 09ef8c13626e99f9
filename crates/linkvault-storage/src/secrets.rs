//! High-level API for the persisted session.

use crate::{SecureStorage, StorageError, StorageKeys, StorageResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Seconds of remaining lifetime under which a token counts as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Identity and expiry stored next to the tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMeta {
    /// User ID from the identity service
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
    /// Identity provider used for sign-in
    #[serde(default)]
    pub provider: Option<String>,
}

impl SessionMeta {
    /// Whether the access token is expired or about to be.
    pub fn is_expired(&self) -> bool {
        self.expires_at - Utc::now() < Duration::seconds(EXPIRY_SKEW_SECS)
    }
}

/// High-level API for storing and retrieving session secrets
pub struct SecretsManager {
    storage: Box<dyn SecureStorage>,
}

impl SecretsManager {
    /// Create a new secrets manager with the given storage backend
    pub fn new(storage: Box<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    pub fn get_access_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::SESSION_ACCESS_TOKEN)
    }

    pub fn get_refresh_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::SESSION_REFRESH_TOKEN)
    }

    pub fn get_session_meta(&self) -> StorageResult<Option<SessionMeta>> {
        match self.storage.get(StorageKeys::SESSION_META)? {
            Some(json) => {
                let meta = serde_json::from_str(&json)
                    .map_err(|e| StorageError::Encoding(e.to_string()))?;
                Ok(Some(meta))
            }
            None => Ok(None),
        }
    }

    /// A session exists when both the access token and its metadata are stored.
    pub fn has_session(&self) -> StorageResult<bool> {
        let has_token = self.storage.has(StorageKeys::SESSION_ACCESS_TOKEN)?;
        let has_meta = self.storage.has(StorageKeys::SESSION_META)?;
        Ok(has_token && has_meta)
    }

    /// Missing metadata counts as expired.
    pub fn is_session_expired(&self) -> StorageResult<bool> {
        Ok(self
            .get_session_meta()?
            .map(|meta| meta.is_expired())
            .unwrap_or(true))
    }

    /// Store complete session (tokens + metadata)
    pub fn set_session(
        &self,
        access_token: &str,
        refresh_token: &str,
        meta: &SessionMeta,
    ) -> StorageResult<()> {
        let json =
            serde_json::to_string(meta).map_err(|e| StorageError::Encoding(e.to_string()))?;
        self.storage
            .set(StorageKeys::SESSION_ACCESS_TOKEN, access_token)?;
        self.storage
            .set(StorageKeys::SESSION_REFRESH_TOKEN, refresh_token)?;
        self.storage.set(StorageKeys::SESSION_META, &json)?;
        tracing::debug!(user_id = %meta.user_id, "session stored");
        Ok(())
    }

    /// Clear the session. Best effort: every key is attempted.
    pub fn clear_session(&self) -> StorageResult<()> {
        let mut first_err = None;
        for key in [
            StorageKeys::SESSION_ACCESS_TOKEN,
            StorageKeys::SESSION_REFRESH_TOKEN,
            StorageKeys::SESSION_META,
        ] {
            if let Err(e) = self.storage.delete(key) {
                tracing::warn!(key, error = %e, "failed to delete session key");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Remember the PKCE verifier of a sign-in in progress.
    pub fn set_code_verifier(&self, verifier: &str) -> StorageResult<()> {
        self.storage.set(StorageKeys::PKCE_CODE_VERIFIER, verifier)
    }

    /// Read and forget the PKCE verifier; it is single use.
    pub fn take_code_verifier(&self) -> StorageResult<Option<String>> {
        let verifier = self.storage.get(StorageKeys::PKCE_CODE_VERIFIER)?;
        if verifier.is_some() {
            self.storage.delete(StorageKeys::PKCE_CODE_VERIFIER)?;
        }
        Ok(verifier)
    }
}
