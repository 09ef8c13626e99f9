//! Local view of one owner's bookmarks, kept in step with the server.
//!
//! The server is the only source of truth. The list re-fetches after every
//! change event and after its own mutations; duplicate refreshes are fine.

use crate::{
    Bookmark, BookmarkRepository, ChangeListener, Notification, Subscription, SyncError,
    SyncResult,
};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Loaded,
}

/// What a renderer needs to draw the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSnapshot {
    pub items: Vec<Bookmark>,
    pub load_state: LoadState,
    /// Inline, dismissible error message.
    pub error: Option<String>,
    /// False when the change subscription could not start or has ended.
    pub live: bool,
}

struct Inner {
    repository: BookmarkRepository,
    owner_id: String,
    state: Mutex<ListSnapshot>,
    version: watch::Sender<u64>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ListSnapshot> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v += 1);
    }

    fn set_error(&self, error: &SyncError) {
        warn!(owner_id = %self.owner_id, category = ?error.category(), error = %error, "bookmark operation failed");
        self.lock().error = Some(error.to_string());
        self.bump();
    }

    async fn on_notification(&self, notification: Notification) {
        match notification {
            Notification::Change(_) => {
                let _ = self.refresh().await;
            }
            Notification::Failed(e) => self.set_error(&e),
            Notification::Closed => {
                self.lock().live = false;
                self.set_error(&SyncError::Realtime("live updates stopped".into()));
            }
        }
    }

    async fn refresh(&self) -> SyncResult<()> {
        match self.repository.list(&self.owner_id).await {
            Ok(items) => {
                {
                    let mut state = self.lock();
                    debug!(owner_id = %self.owner_id, count = items.len(), "list refreshed");
                    state.items = items;
                    state.load_state = LoadState::Loaded;
                }
                self.bump();
                Ok(())
            }
            Err(e) => {
                self.lock().load_state = LoadState::Loaded;
                self.set_error(&e);
                Err(e)
            }
        }
    }
}

/// Bookmark list of one owner, refreshed by the change listener.
pub struct LiveBookmarkList {
    inner: Arc<Inner>,
    subscription: Option<Subscription>,
}

impl LiveBookmarkList {
    /// Subscribe to changes, then fetch the initial list.
    ///
    /// Subscribing first means a change landing during the fetch still
    /// triggers a refresh. Neither step fails the call: errors land in the
    /// snapshot's error slot so the view stays usable.
    pub async fn open(
        repository: BookmarkRepository,
        listener: &ChangeListener,
        owner_id: &str,
    ) -> Self {
        let (version, _) = watch::channel(0);
        let inner = Arc::new(Inner {
            repository,
            owner_id: owner_id.to_string(),
            state: Mutex::new(ListSnapshot {
                items: Vec::new(),
                load_state: LoadState::Loading,
                error: None,
                live: true,
            }),
            version,
        });

        let handle = inner.clone();
        let subscription = match listener
            .start(owner_id, move |notification| {
                let inner = handle.clone();
                async move { inner.on_notification(notification).await }
            })
            .await
        {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                inner.lock().live = false;
                inner.set_error(&e);
                None
            }
        };

        let _ = inner.refresh().await;

        Self {
            inner,
            subscription,
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.inner.owner_id
    }

    pub fn snapshot(&self) -> ListSnapshot {
        self.inner.lock().clone()
    }

    /// Receiver whose value increments on every state change.
    pub fn subscribe_versions(&self) -> watch::Receiver<u64> {
        self.inner.version.subscribe()
    }

    /// Whether the change subscription is still running.
    pub fn is_live(&self) -> bool {
        self.inner.lock().live && self.subscription.as_ref().is_some_and(|s| s.is_active())
    }

    /// Re-list. On error the previous items are kept.
    pub async fn refresh(&self) -> SyncResult<()> {
        self.inner.refresh().await
    }

    /// Validate, create, then refresh.
    ///
    /// Validation errors are returned without touching the error slot; the
    /// form reports them inline.
    pub async fn add(&self, title: &str, url: &str) -> SyncResult<()> {
        match self.inner.repository.create(&self.inner.owner_id, title, url).await {
            Ok(()) => self.inner.refresh().await,
            Err(e @ SyncError::Validation(_)) => Err(e),
            Err(e) => {
                self.inner.set_error(&e);
                Err(e)
            }
        }
    }

    /// Delete, then drop the item locally without waiting for a refresh.
    pub async fn remove(&self, id: &str) -> SyncResult<()> {
        if let Err(e) = self.inner.repository.delete(id).await {
            self.inner.set_error(&e);
            return Err(e);
        }
        self.inner.lock().items.retain(|b| b.id != id);
        self.inner.bump();
        Ok(())
    }

    pub fn dismiss_error(&self) {
        let had_error = self.inner.lock().error.take().is_some();
        if had_error {
            self.inner.bump();
        }
    }

    /// Stop the change subscription.
    pub async fn close(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.stop().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BookmarkBackend, ChangeFeed, ChangeStream, NewBookmark};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct FlakyBackend {
        rows: Mutex<Vec<Bookmark>>,
        fail_reads: AtomicBool,
        fail_deletes: AtomicBool,
    }

    #[async_trait]
    impl BookmarkBackend for FlakyBackend {
        async fn select_by_owner(&self, owner_id: &str) -> SyncResult<Vec<Bookmark>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(SyncError::Api {
                    status: 503,
                    message: "unavailable".into(),
                });
            }
            let rows = self.rows.lock().unwrap();
            Ok(rows.iter().filter(|b| b.user_id == owner_id).cloned().collect())
        }

        async fn insert(&self, bookmark: &NewBookmark) -> SyncResult<()> {
            let mut rows = self.rows.lock().unwrap();
            let id = format!("b-{}", rows.len() + 1);
            rows.push(Bookmark {
                id,
                user_id: bookmark.user_id.clone(),
                title: bookmark.title.clone(),
                url: bookmark.url.clone(),
                created_at: Utc::now(),
            });
            Ok(())
        }

        async fn delete_by_id(&self, id: &str) -> SyncResult<()> {
            if self.fail_deletes.load(Ordering::SeqCst) {
                return Err(SyncError::Api {
                    status: 500,
                    message: "boom".into(),
                });
            }
            self.rows.lock().unwrap().retain(|b| b.id != id);
            Ok(())
        }
    }

    struct SilentStream;

    #[async_trait]
    impl ChangeStream for SilentStream {
        async fn next_event(&mut self) -> Option<SyncResult<crate::ChangeEvent>> {
            std::future::pending().await
        }

        async fn close(&mut self) {}
    }

    struct SilentFeed {
        refuse: bool,
    }

    #[async_trait]
    impl ChangeFeed for SilentFeed {
        async fn subscribe(&self, _owner_id: &str) -> SyncResult<Box<dyn ChangeStream>> {
            if self.refuse {
                return Err(SyncError::Realtime("join refused".into()));
            }
            Ok(Box::new(SilentStream))
        }
    }

    async fn open_list(backend: Arc<FlakyBackend>, refuse: bool) -> LiveBookmarkList {
        let listener = ChangeListener::new(Arc::new(SilentFeed { refuse }));
        LiveBookmarkList::open(BookmarkRepository::new(backend), &listener, "owner-a").await
    }

    #[tokio::test]
    async fn test_open_loads_and_subscribes() {
        let backend = Arc::new(FlakyBackend::default());
        backend
            .insert(&NewBookmark {
                user_id: "owner-a".into(),
                title: "Docs".into(),
                url: "https://docs.rs".into(),
            })
            .await
            .unwrap();

        let list = open_list(backend, false).await;
        let snapshot = list.snapshot();
        assert_eq!(snapshot.load_state, LoadState::Loaded);
        assert_eq!(snapshot.items.len(), 1);
        assert!(snapshot.error.is_none());
        assert!(list.is_live());
        list.close().await;
    }

    #[tokio::test]
    async fn test_subscribe_failure_is_inline_error() {
        let list = open_list(Arc::new(FlakyBackend::default()), true).await;
        let snapshot = list.snapshot();
        assert_eq!(snapshot.load_state, LoadState::Loaded);
        assert!(snapshot.error.unwrap().contains("join refused"));
        assert!(!list.is_live());
    }

    #[tokio::test]
    async fn test_add_refreshes_and_bumps_version() {
        let list = open_list(Arc::new(FlakyBackend::default()), false).await;
        let versions = list.subscribe_versions();
        let before = *versions.borrow();

        list.add("GitHub", "https://github.com").await.unwrap();

        let snapshot = list.snapshot();
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.items[0].title, "GitHub");
        assert!(*versions.borrow() > before);
        list.close().await;
    }

    #[tokio::test]
    async fn test_add_validation_error_leaves_slot_empty() {
        let list = open_list(Arc::new(FlakyBackend::default()), false).await;

        let err = list.add("Broken", "not-a-url").await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        assert!(list.snapshot().error.is_none());
        list.close().await;
    }

    #[tokio::test]
    async fn test_refresh_error_keeps_items() {
        let backend = Arc::new(FlakyBackend::default());
        let list = open_list(backend.clone(), false).await;
        list.add("GitHub", "https://github.com").await.unwrap();

        backend.fail_reads.store(true, Ordering::SeqCst);
        assert!(list.refresh().await.is_err());

        let snapshot = list.snapshot();
        assert_eq!(snapshot.items.len(), 1);
        assert!(snapshot.error.is_some());

        list.dismiss_error();
        assert!(list.snapshot().error.is_none());
        list.close().await;
    }

    #[tokio::test]
    async fn test_remove_filters_locally() {
        let backend = Arc::new(FlakyBackend::default());
        let list = open_list(backend.clone(), false).await;
        list.add("One", "https://one.example").await.unwrap();
        list.add("Two", "https://two.example").await.unwrap();

        // Reads fail, so only the local filter can drop the row.
        backend.fail_reads.store(true, Ordering::SeqCst);
        let id = list.snapshot().items[0].id.clone();
        list.remove(&id).await.unwrap();

        let snapshot = list.snapshot();
        assert_eq!(snapshot.items.len(), 1);
        assert!(snapshot.items.iter().all(|b| b.id != id));
        list.close().await;
    }

    #[tokio::test]
    async fn test_remove_failure_keeps_item() {
        let backend = Arc::new(FlakyBackend::default());
        let list = open_list(backend.clone(), false).await;
        list.add("One", "https://one.example").await.unwrap();

        backend.fail_deletes.store(true, Ordering::SeqCst);
        let id = list.snapshot().items[0].id.clone();
        assert!(list.remove(&id).await.is_err());

        let snapshot = list.snapshot();
        assert_eq!(snapshot.items.len(), 1);
        assert!(snapshot.error.unwrap().contains("boom"));
        list.close().await;
    }

    struct ScriptedStream {
        script: std::collections::VecDeque<SyncError>,
    }

    #[async_trait]
    impl ChangeStream for ScriptedStream {
        async fn next_event(&mut self) -> Option<SyncResult<crate::ChangeEvent>> {
            self.script.pop_front().map(Err)
        }

        async fn close(&mut self) {}
    }

    /// Server drops the channel right after the join.
    struct DroppingFeed;

    #[async_trait]
    impl ChangeFeed for DroppingFeed {
        async fn subscribe(&self, _owner_id: &str) -> SyncResult<Box<dyn ChangeStream>> {
            Ok(Box::new(ScriptedStream {
                script: [SyncError::Realtime("channel closed by server".into())].into(),
            }))
        }
    }

    /// Another session inserts a row while the subscription is being set up.
    struct RacingFeed {
        backend: Arc<FlakyBackend>,
    }

    #[async_trait]
    impl ChangeFeed for RacingFeed {
        async fn subscribe(&self, owner_id: &str) -> SyncResult<Box<dyn ChangeStream>> {
            self.backend
                .insert(&NewBookmark {
                    user_id: owner_id.into(),
                    title: "Racing".into(),
                    url: "https://race.example".into(),
                })
                .await?;
            Ok(Box::new(SilentStream))
        }
    }

    #[tokio::test]
    async fn test_stream_failure_and_end_reach_the_view() {
        let listener = ChangeListener::new(Arc::new(DroppingFeed));
        let list = LiveBookmarkList::open(
            BookmarkRepository::new(Arc::new(FlakyBackend::default())),
            &listener,
            "owner-a",
        )
        .await;
        let mut versions = list.subscribe_versions();

        tokio::time::timeout(
            std::time::Duration::from_secs(2),
            versions.wait_for(|_| !list.snapshot().live),
        )
        .await
        .unwrap()
        .unwrap();

        let snapshot = list.snapshot();
        assert!(!snapshot.live);
        assert!(!list.is_live());
        assert!(snapshot.error.unwrap().contains("live updates stopped"));
        list.close().await;
    }

    #[tokio::test]
    async fn test_change_during_open_is_not_missed() {
        let backend = Arc::new(FlakyBackend::default());
        let listener = ChangeListener::new(Arc::new(RacingFeed {
            backend: backend.clone(),
        }));
        let list =
            LiveBookmarkList::open(BookmarkRepository::new(backend), &listener, "owner-a").await;

        let snapshot = list.snapshot();
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.items[0].title, "Racing");
        assert!(snapshot.live);
        list.close().await;
    }
}
