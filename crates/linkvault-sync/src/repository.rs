//! Owner-scoped bookmark operations.

use crate::validation::validate_new_bookmark;
use crate::{Bookmark, BookmarkBackend, SyncResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Create, list and delete bookmarks of one owner at a time.
#[derive(Clone)]
pub struct BookmarkRepository {
    backend: Arc<dyn BookmarkBackend>,
}

impl BookmarkRepository {
    pub fn new(backend: Arc<dyn BookmarkBackend>) -> Self {
        Self { backend }
    }

    /// All bookmarks of `owner_id`, newest first.
    ///
    /// Rows belonging to anyone else are dropped even if the backend
    /// returned them.
    pub async fn list(&self, owner_id: &str) -> SyncResult<Vec<Bookmark>> {
        let rows = self.backend.select_by_owner(owner_id).await?;
        let fetched = rows.len();

        let mut bookmarks: Vec<Bookmark> = rows
            .into_iter()
            .filter(|b| b.user_id == owner_id)
            .collect();
        if bookmarks.len() != fetched {
            warn!(
                owner_id,
                dropped = fetched - bookmarks.len(),
                "backend returned rows of another owner"
            );
        }

        bookmarks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        debug!(owner_id, count = bookmarks.len(), "listed bookmarks");
        Ok(bookmarks)
    }

    /// Validate and insert. Nothing is sent when validation fails.
    ///
    /// Success is only an acknowledgement; re-list to see the new row.
    pub async fn create(&self, owner_id: &str, title: &str, url: &str) -> SyncResult<()> {
        let bookmark = validate_new_bookmark(owner_id, title, url)?;
        self.backend.insert(&bookmark).await?;
        info!(owner_id, "bookmark created");
        Ok(())
    }

    /// Delete by id. Deleting a missing id succeeds.
    pub async fn delete(&self, id: &str) -> SyncResult<()> {
        self.backend.delete_by_id(id).await?;
        info!(bookmark_id = id, "bookmark deleted");
        Ok(())
    }
}
