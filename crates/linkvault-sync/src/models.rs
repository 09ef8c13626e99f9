//! Bookmark rows and change events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted bookmark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    /// Owner; immutable once set.
    pub user_id: String,
    pub title: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload. `id` and `created_at` are assigned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBookmark {
    pub user_id: String,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A row-level change pushed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub table: String,
    pub schema: String,
    /// New row; absent for deletes.
    #[serde(default)]
    pub record: Option<serde_json::Value>,
    #[serde(default)]
    pub old_record: Option<serde_json::Value>,
    #[serde(default)]
    pub commit_timestamp: Option<String>,
}

impl ChangeEvent {
    /// `id` of the affected row, taken from whichever record carries it.
    pub fn row_id(&self) -> Option<&str> {
        [&self.record, &self.old_record]
            .into_iter()
            .flatten()
            .find_map(|r| r.get("id").and_then(|v| v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bookmark_from_postgrest_row() {
        let json = r#"{
            "id": "7a0c1f8e-2f44-4e43-9d3c-1c1f0f6b1b11",
            "user_id": "user-1",
            "title": "GitHub",
            "url": "https://github.com",
            "created_at": "2024-05-01T10:00:00.123456+00:00"
        }"#;
        let bookmark: Bookmark = serde_json::from_str(json).unwrap();
        assert_eq!(bookmark.title, "GitHub");
        assert_eq!(bookmark.created_at.timestamp(), 1714557600);
    }

    #[test]
    fn test_delete_event_row_id_from_old_record() {
        let json = r#"{
            "type": "DELETE",
            "table": "bookmarks",
            "schema": "public",
            "record": null,
            "old_record": {"id": "b-1"},
            "commit_timestamp": "2024-05-01T10:00:00Z"
        }"#;
        let event: ChangeEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind, ChangeKind::Delete);
        assert_eq!(event.row_id(), Some("b-1"));
    }
}
