//! In-memory stand-in for the managed backend: row storage plus a change
//! feed that pushes owner-filtered events to every open stream.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use linkvault_sync::{
    Bookmark, BookmarkBackend, ChangeEvent, ChangeFeed, ChangeKind, ChangeStream, NewBookmark,
    SyncResult,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::broadcast;

pub struct InMemoryBackend {
    rows: Mutex<Vec<Bookmark>>,
    changes: broadcast::Sender<(String, ChangeEvent)>,
    calls: AtomicUsize,
    /// When set, selects return every row regardless of owner.
    leak_foreign_rows: bool,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            rows: Mutex::new(Vec::new()),
            changes,
            calls: AtomicUsize::new(0),
            leak_foreign_rows: false,
        }
    }

    /// A backend with broken row-level policies.
    pub fn leaky() -> Self {
        Self {
            leak_foreign_rows: true,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    fn publish(&self, owner_id: &str, kind: ChangeKind, row: &Bookmark) {
        let value = json!({
            "id": row.id,
            "user_id": row.user_id,
            "title": row.title,
            "url": row.url,
            "created_at": row.created_at,
        });
        let (record, old_record) = match kind {
            ChangeKind::Delete => (None, Some(json!({ "id": row.id }))),
            _ => (Some(value), None),
        };
        let event = ChangeEvent {
            kind,
            table: "bookmarks".into(),
            schema: "public".into(),
            record,
            old_record,
            commit_timestamp: Some(Utc::now().to_rfc3339()),
        };
        let _ = self.changes.send((owner_id.to_string(), event));
    }
}

#[async_trait]
impl BookmarkBackend for InMemoryBackend {
    async fn select_by_owner(&self, owner_id: &str) -> SyncResult<Vec<Bookmark>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.lock().unwrap();
        let mut selected: Vec<Bookmark> = rows
            .iter()
            .filter(|b| self.leak_foreign_rows || b.user_id == owner_id)
            .cloned()
            .collect();
        selected.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(selected)
    }

    async fn insert(&self, bookmark: &NewBookmark) -> SyncResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let row = {
            let mut rows = self.rows.lock().unwrap();
            // Strictly increasing timestamps keep ordering deterministic.
            let created_at = rows
                .iter()
                .map(|b| b.created_at + Duration::milliseconds(1))
                .max()
                .unwrap_or_else(Utc::now);
            let row = Bookmark {
                id: uuid::Uuid::new_v4().to_string(),
                user_id: bookmark.user_id.clone(),
                title: bookmark.title.clone(),
                url: bookmark.url.clone(),
                created_at,
            };
            rows.push(row.clone());
            row
        };
        self.publish(&bookmark.user_id, ChangeKind::Insert, &row);
        Ok(())
    }

    async fn delete_by_id(&self, id: &str) -> SyncResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let removed = {
            let mut rows = self.rows.lock().unwrap();
            let position = rows.iter().position(|b| b.id == id);
            position.map(|i| rows.remove(i))
        };
        if let Some(row) = removed {
            self.publish(&row.user_id, ChangeKind::Delete, &row);
        }
        Ok(())
    }
}

#[async_trait]
impl ChangeFeed for InMemoryBackend {
    async fn subscribe(&self, owner_id: &str) -> SyncResult<Box<dyn ChangeStream>> {
        Ok(Box::new(OwnerStream {
            owner_id: owner_id.to_string(),
            rx: Some(self.changes.subscribe()),
        }))
    }
}

struct OwnerStream {
    owner_id: String,
    rx: Option<broadcast::Receiver<(String, ChangeEvent)>>,
}

#[async_trait]
impl ChangeStream for OwnerStream {
    async fn next_event(&mut self) -> Option<SyncResult<ChangeEvent>> {
        let rx = self.rx.as_mut()?;
        loop {
            match rx.recv().await {
                Ok((owner, event)) if owner == self.owner_id => return Some(Ok(event)),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    async fn close(&mut self) {
        self.rx = None;
    }
}
