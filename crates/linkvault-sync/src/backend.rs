//! Seams between the sync layer and the managed backend.

use crate::{Bookmark, ChangeEvent, NewBookmark, SyncResult};
use async_trait::async_trait;
use linkvault_auth::SessionStore;

/// Source of bearer tokens for data calls.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> SyncResult<String>;
}

#[async_trait]
impl AccessTokenProvider for SessionStore {
    async fn access_token(&self) -> SyncResult<String> {
        Ok(SessionStore::access_token(self).await?)
    }
}

/// Row storage for bookmarks, authorized per owner by the backend.
#[async_trait]
pub trait BookmarkBackend: Send + Sync {
    /// Rows of `owner_id`, newest first.
    async fn select_by_owner(&self, owner_id: &str) -> SyncResult<Vec<Bookmark>>;

    async fn insert(&self, bookmark: &NewBookmark) -> SyncResult<()>;

    /// Succeeds when no row matches.
    async fn delete_by_id(&self, id: &str) -> SyncResult<()>;
}

/// Server-pushed change notifications.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Open a stream of changes on the rows of `owner_id`.
    async fn subscribe(&self, owner_id: &str) -> SyncResult<Box<dyn ChangeStream>>;
}

/// An open change subscription.
#[async_trait]
pub trait ChangeStream: Send {
    /// Next event; `None` once the stream has ended.
    async fn next_event(&mut self) -> Option<SyncResult<ChangeEvent>>;

    /// Leave the channel and release the connection.
    async fn close(&mut self);
}
