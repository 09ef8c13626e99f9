//! Session store with FSM-tracked state and transparent refresh.
//!
//! The FSM tracks transient states (exchanging, refreshing, signing out) that
//! are never persisted; tokens and identity live in the [`SecretsManager`].
//! Every state change is published on a watch channel so views can
//! re-evaluate their guards.

use crate::auth_fsm::{AuthMachine, AuthMachineInput, AuthState, RefreshConfig};
use crate::{AuthApi, AuthError, AuthResult, GoTrueClient, PkcePair, TokenGrant, UserIdentity};
use chrono::{Duration, Utc};
use linkvault_config_and_utils::{Config, Paths};
use linkvault_storage::{SecretsManager, SessionMeta};
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

/// Explicit handle on the authenticated session.
pub struct SessionStore {
    secrets: SecretsManager,
    api: Arc<dyn AuthApi>,
    provider: String,
    fsm: Mutex<AuthMachine>,
    refresh_config: RefreshConfig,
    state_tx: watch::Sender<AuthState>,
    /// Serializes refreshes; held across the expiry check, refresh and persist.
    refresh_lock: AsyncMutex<()>,
}

impl SessionStore {
    pub fn new(secrets: SecretsManager, api: Arc<dyn AuthApi>, provider: impl Into<String>) -> Self {
        let (state_tx, _) = watch::channel(AuthState::SignedOut);
        Self {
            secrets,
            api,
            provider: provider.into(),
            fsm: Mutex::new(AuthMachine::new()),
            refresh_config: RefreshConfig::default(),
            state_tx,
            refresh_lock: AsyncMutex::new(()),
        }
    }

    /// Production wiring: file-backed storage and GoTrue over HTTP.
    pub fn from_config(config: &Config, paths: &Paths) -> AuthResult<Self> {
        let secrets = linkvault_storage::create_secrets_manager(paths)?;
        let api = GoTrueClient::new(config.api_base(), &config.supabase_publishable_key);
        Ok(Self::new(secrets, Arc::new(api), &config.oauth_provider))
    }

    pub fn with_refresh_config(mut self, refresh_config: RefreshConfig) -> Self {
        self.refresh_config = refresh_config;
        self
    }

    pub fn state(&self) -> AuthState {
        let fsm = self.fsm.lock().unwrap_or_else(|e| e.into_inner());
        AuthState::from(fsm.state())
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }

    fn transition(&self, input: &AuthMachineInput) -> AuthResult<AuthState> {
        let mut fsm = self.fsm.lock().unwrap_or_else(|e| e.into_inner());
        let old_state = AuthState::from(fsm.state());

        fsm.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                fsm.state()
            ))
        })?;

        let new_state = AuthState::from(fsm.state());
        drop(fsm);

        if old_state != new_state {
            debug!(old_state = ?old_state, new_state = ?new_state, "auth state transition");
            self.state_tx.send_replace(new_state);
        }

        Ok(new_state)
    }

    /// Identity of the persisted session, without a network round trip.
    pub fn current_user(&self) -> AuthResult<Option<UserIdentity>> {
        if !self.secrets.has_session()? {
            return Ok(None);
        }
        Ok(self
            .secrets
            .get_session_meta()?
            .map(|meta| UserIdentity::from(&meta)))
    }

    /// Start a PKCE sign-in and return the provider authorize URL.
    ///
    /// The verifier is persisted so the exchange can be completed by a later
    /// call to [`exchange_authorization_code`](Self::exchange_authorization_code).
    pub fn begin_sign_in(&self, redirect_to: &str) -> AuthResult<String> {
        let pkce = PkcePair::generate();
        self.secrets.set_code_verifier(&pkce.verifier)?;

        let url = self
            .api
            .authorize_url(&self.provider, redirect_to, &pkce.challenge)?;
        info!(provider = %self.provider, "sign-in started");
        Ok(url)
    }

    /// Redeem a one-time authorization code for a session.
    ///
    /// On failure the store is left signed out.
    pub async fn exchange_authorization_code(&self, code: &str) -> AuthResult<UserIdentity> {
        self.transition(&AuthMachineInput::ExchangeStarted)?;

        match self.try_exchange(code).await {
            Ok(identity) => {
                self.transition(&AuthMachineInput::ExchangeSucceeded)?;
                info!(user_id = %identity.id, "signed in");
                Ok(identity)
            }
            Err(e) => {
                warn!(error = %e, "code exchange failed");
                self.transition(&AuthMachineInput::ExchangeFailed)?;
                Err(e)
            }
        }
    }

    async fn try_exchange(&self, code: &str) -> AuthResult<UserIdentity> {
        let verifier = self
            .secrets
            .take_code_verifier()?
            .ok_or(AuthError::MissingCodeVerifier)?;

        let grant = self.api.exchange_code(code, &verifier).await?;
        let meta = self.persist_grant(&grant)?;
        Ok(UserIdentity::from(&meta))
    }

    fn persist_grant(&self, grant: &TokenGrant) -> AuthResult<SessionMeta> {
        let meta = SessionMeta {
            user_id: grant.user.id.clone(),
            email: grant.user.email.clone(),
            full_name: grant.user.full_name(),
            expires_at: Utc::now() + Duration::seconds(grant.expires_in),
            provider: Some(self.provider.clone()),
        };
        self.secrets
            .set_session(&grant.access_token, &grant.refresh_token, &meta)?;
        Ok(meta)
    }

    /// Validate the persisted session on startup.
    ///
    /// A locally valid token is confirmed with the server; an expired one is
    /// refreshed with backoff. A session the server rejects is cleared.
    ///
    /// Returns:
    /// - `Ok(true)` if the session is valid or was refreshed
    /// - `Ok(false)` if no session exists
    /// - `Err(...)` if the session was invalid and has been cleared
    pub async fn restore(&self) -> AuthResult<bool> {
        let _refreshing = self.refresh_lock.lock().await;
        self.transition(&AuthMachineInput::Restore)?;

        let session = (
            self.secrets.has_session()?,
            self.secrets.get_session_meta()?,
            self.secrets.get_access_token()?,
        );
        let (meta, access_token) = match session {
            (true, Some(meta), Some(token)) => (meta, token),
            (has_session, _, _) => {
                if has_session {
                    info!("incomplete session found, clearing");
                    self.secrets.clear_session()?;
                } else {
                    debug!("no persisted session");
                }
                self.transition(&AuthMachineInput::NoSession)?;
                return Ok(false);
            }
        };

        if meta.is_expired() {
            info!(user_id = %meta.user_id, "session expired, refreshing");
            self.transition(&AuthMachineInput::TokenExpired)?;
            self.refresh_stored().await?;
            return Ok(true);
        }

        self.transition(&AuthMachineInput::TokenValid)?;
        match self.api.get_user(&access_token).await {
            Ok(user) => {
                info!(user_id = %user.id, "session restored");
                self.transition(&AuthMachineInput::ServerVerified)?;
                Ok(true)
            }
            Err(e) => {
                warn!(user_id = %meta.user_id, error = %e, "session verification failed, clearing session");
                self.secrets.clear_session()?;
                self.transition(&AuthMachineInput::ServerRejected)?;
                Err(e)
            }
        }
    }

    /// A bearer token for data calls, refreshed when expired locally.
    ///
    /// Concurrent callers share one refresh: late arrivals wait for it and
    /// then read the token it stored.
    pub async fn access_token(&self) -> AuthResult<String> {
        if let Some(token) = self.stored_token_if_fresh()? {
            return Ok(token);
        }

        let _refreshing = self.refresh_lock.lock().await;
        if let Some(token) = self.stored_token_if_fresh()? {
            debug!("token refreshed by a concurrent caller");
            return Ok(token);
        }

        info!("access token expired, refreshing");
        if self.state() != AuthState::SignedIn {
            self.transition(&AuthMachineInput::Restore)?;
        }
        self.transition(&AuthMachineInput::TokenExpired)?;
        self.refresh_stored().await
    }

    /// The stored access token, or `None` when it has expired.
    fn stored_token_if_fresh(&self) -> AuthResult<Option<String>> {
        if !self.secrets.has_session()? {
            return Err(AuthError::NotLoggedIn);
        }
        let access_token = self
            .secrets
            .get_access_token()?
            .ok_or(AuthError::NotLoggedIn)?;

        if self.secrets.is_session_expired()? {
            Ok(None)
        } else {
            Ok(Some(access_token))
        }
    }

    async fn refresh_stored(&self) -> AuthResult<String> {
        match self.secrets.get_refresh_token()? {
            Some(refresh_token) => self.refresh_with_backoff(&refresh_token).await,
            None => {
                warn!("session expired but no refresh token found, clearing session");
                self.secrets.clear_session()?;
                self.transition(&AuthMachineInput::RefreshFailed)?;
                Err(AuthError::TokenRefresh(
                    "No refresh token available".to_string(),
                ))
            }
        }
    }

    async fn refresh_with_backoff(&self, refresh_token: &str) -> AuthResult<String> {
        let mut last_error = None;

        for attempt in 0..self.refresh_config.max_retries {
            match self.api.refresh(refresh_token).await {
                Ok(grant) => {
                    let meta = self.persist_grant(&grant)?;
                    self.transition(&AuthMachineInput::RefreshSucceeded)?;
                    info!(user_id = %meta.user_id, "token refreshed");
                    return Ok(grant.access_token);
                }
                Err(e) if e.is_transient() => {
                    last_error = Some(e);

                    if attempt + 1 < self.refresh_config.max_retries {
                        let _ = self.transition(&AuthMachineInput::RefreshRetry);

                        let delay = self.refresh_config.delay_for_attempt(attempt);
                        debug!(
                            attempt = attempt + 1,
                            max_retries = self.refresh_config.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            "refresh failed with transient error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "refresh rejected, clearing session");
                    self.secrets.clear_session()?;
                    self.transition(&AuthMachineInput::RefreshFailed)?;
                    return Err(e);
                }
            }
        }

        warn!(
            attempts = self.refresh_config.max_retries,
            "refresh retries exhausted, clearing session"
        );
        self.secrets.clear_session()?;
        self.transition(&AuthMachineInput::RefreshFailed)?;

        Err(last_error.unwrap_or(AuthError::RefreshExhausted(
            self.refresh_config.max_retries,
        )))
    }

    /// Revoke remotely (best effort) and clear the local session.
    pub async fn sign_out(&self) -> AuthResult<()> {
        let _ = self.transition(&AuthMachineInput::SignOutRequested);

        if let Some(token) = self.secrets.get_access_token()? {
            if let Err(e) = self.api.sign_out(&token).await {
                warn!(error = %e, "remote sign-out failed, clearing local session anyway");
            }
        }

        let cleared = self.secrets.clear_session();
        let _ = self.transition(&AuthMachineInput::SignOutComplete);
        cleared?;

        info!("signed out");
        Ok(())
    }
}
