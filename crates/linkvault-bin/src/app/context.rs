//! Handles shared by every command.

use crate::routes::{guard, Route};
use linkvault_auth::{SessionStore, UserIdentity};
use linkvault_config_and_utils::{Config, Paths};
use linkvault_sync::{
    AccessTokenProvider, BookmarkRepository, ChangeListener, RealtimeFeed, SupabaseRestClient,
    SyncResult,
};
use std::sync::Arc;

/// Session, data access and change listener, wired from configuration.
pub struct AppContext {
    pub config: Config,
    pub paths: Paths,
    pub session: Arc<SessionStore>,
    pub repository: BookmarkRepository,
    pub listener: ChangeListener,
}

impl AppContext {
    pub fn new(config: Config, paths: Paths) -> SyncResult<Self> {
        let session = Arc::new(SessionStore::from_config(&config, &paths)?);
        Self::with_session(config, paths, session)
    }

    pub fn with_session(config: Config, paths: Paths, session: Arc<SessionStore>) -> SyncResult<Self> {
        let tokens: Arc<dyn AccessTokenProvider> = session.clone();
        let rest = SupabaseRestClient::from_config(&config, tokens.clone());
        let feed = RealtimeFeed::from_config(&config, tokens)?;

        Ok(Self {
            config,
            paths,
            session,
            repository: BookmarkRepository::new(Arc::new(rest)),
            listener: ChangeListener::new(Arc::new(feed)),
        })
    }

    /// The route `requested` resolves to, with the signed-in user if any.
    ///
    /// Reads the persisted session only; no network call.
    pub fn resolve(&self, requested: Route) -> (Route, Option<UserIdentity>) {
        let user = self.session.current_user().ok().flatten();
        (guard(requested, user.as_ref()), user)
    }
}
