mod common;

use common::InMemoryBackend;
use linkvault_sync::{
    BookmarkRepository, ChangeListener, LiveBookmarkList, SyncError, ValidationError,
};
use std::sync::Arc;
use std::time::Duration;

const OWNER_A: &str = "owner-a";
const OWNER_B: &str = "owner-b";

fn repository(backend: &Arc<InMemoryBackend>) -> BookmarkRepository {
    BookmarkRepository::new(backend.clone())
}

#[tokio::test]
async fn test_create_then_list_returns_server_assigned_fields() {
    let backend = Arc::new(InMemoryBackend::new());
    let repo = repository(&backend);

    repo.create(OWNER_A, "GitHub", "https://github.com").await.unwrap();

    let bookmarks = repo.list(OWNER_A).await.unwrap();
    assert_eq!(bookmarks.len(), 1);
    let bookmark = &bookmarks[0];
    assert_eq!(bookmark.title, "GitHub");
    assert_eq!(bookmark.url, "https://github.com");
    assert_eq!(bookmark.user_id, OWNER_A);
    assert!(!bookmark.id.is_empty());
}

#[tokio::test]
async fn test_malformed_url_is_rejected_without_network_call() {
    let backend = Arc::new(InMemoryBackend::new());
    let repo = repository(&backend);

    for url in ["not-a-url", "", "   ", "github.com", "//missing-scheme"] {
        let err = repo.create(OWNER_A, "Broken", url).await.unwrap_err();
        assert!(
            matches!(err, SyncError::Validation(ValidationError::InvalidUrl)),
            "{:?} should be rejected",
            url
        );
    }

    assert_eq!(backend.calls(), 0);
    assert_eq!(backend.row_count(), 0);
}

#[tokio::test]
async fn test_well_formed_urls_are_accepted() {
    let backend = Arc::new(InMemoryBackend::new());
    let repo = repository(&backend);

    for url in [
        "https://github.com",
        "http://localhost:3000/path?q=1",
        "mailto:someone@example.com",
        "ftp://files.example.org/pub",
    ] {
        repo.create(OWNER_A, "Link", url).await.unwrap();
    }

    assert_eq!(repo.list(OWNER_A).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_blank_title_is_rejected_locally() {
    let backend = Arc::new(InMemoryBackend::new());
    let repo = repository(&backend);

    for title in ["", "   ", "\t\n"] {
        let err = repo
            .create(OWNER_A, title, "https://github.com")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::Validation(ValidationError::EmptyTitle)
        ));
    }
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_list_never_returns_foreign_rows() {
    let backend = Arc::new(InMemoryBackend::leaky());
    let repo = repository(&backend);

    repo.create(OWNER_A, "Mine", "https://a.example").await.unwrap();
    repo.create(OWNER_B, "Theirs", "https://b.example").await.unwrap();
    repo.create(OWNER_A, "Also mine", "https://a2.example").await.unwrap();

    let listed = repo.list(OWNER_A).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|b| b.user_id == OWNER_A));
    assert_eq!(listed[0].title, "Also mine");
}

#[tokio::test]
async fn test_deleted_id_is_never_listed_again() {
    let backend = Arc::new(InMemoryBackend::new());
    let repo = repository(&backend);

    repo.create(OWNER_A, "Keep", "https://keep.example").await.unwrap();
    repo.create(OWNER_A, "Drop", "https://drop.example").await.unwrap();
    let id = repo
        .list(OWNER_A)
        .await
        .unwrap()
        .into_iter()
        .find(|b| b.title == "Drop")
        .unwrap()
        .id;

    repo.delete(&id).await.unwrap();
    // Second delete of the same id is a no-op.
    repo.delete(&id).await.unwrap();

    let listed = repo.list(OWNER_A).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed.iter().all(|b| b.id != id));
}

async fn wait_until<F: Fn() -> bool>(list: &LiveBookmarkList, done: F) {
    let mut versions = list.subscribe_versions();
    let wait = async {
        while !done() {
            if versions.changed().await.is_err() {
                break;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(2), wait)
        .await
        .expect("list did not converge in time");
}

#[tokio::test]
async fn test_second_session_sees_delete_after_change_notification() {
    let backend = Arc::new(InMemoryBackend::new());
    let repo = repository(&backend);
    repo.create(OWNER_A, "GitHub", "https://github.com").await.unwrap();
    repo.create(OWNER_A, "Docs", "https://docs.rs").await.unwrap();

    let first_listener = ChangeListener::new(backend.clone());
    let second_listener = ChangeListener::new(backend.clone());
    let first = LiveBookmarkList::open(repository(&backend), &first_listener, OWNER_A).await;
    let second = LiveBookmarkList::open(repository(&backend), &second_listener, OWNER_A).await;
    assert_eq!(second.snapshot().items.len(), 2);

    let id = first
        .snapshot()
        .items
        .into_iter()
        .find(|b| b.title == "GitHub")
        .unwrap()
        .id;
    first.remove(&id).await.unwrap();

    wait_until(&second, || {
        second.snapshot().items.iter().all(|b| b.id != id)
    })
    .await;
    let items = second.snapshot().items;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "Docs");

    first.close().await;
    second.close().await;
}

#[tokio::test]
async fn test_other_owner_changes_do_not_reach_list() {
    let backend = Arc::new(InMemoryBackend::new());
    let listener = ChangeListener::new(backend.clone());
    let list = LiveBookmarkList::open(repository(&backend), &listener, OWNER_A).await;
    let versions = list.subscribe_versions();
    let before = *versions.borrow();

    repository(&backend)
        .create(OWNER_B, "Theirs", "https://b.example")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(*versions.borrow(), before);
    assert!(list.snapshot().items.is_empty());
    list.close().await;
}

#[tokio::test]
async fn test_add_in_one_session_appears_in_another() {
    let backend = Arc::new(InMemoryBackend::new());
    let listener = ChangeListener::new(backend.clone());
    let writer = LiveBookmarkList::open(repository(&backend), &listener, OWNER_A).await;
    let reader = LiveBookmarkList::open(repository(&backend), &listener, OWNER_A).await;

    writer.add("GitHub", "https://github.com").await.unwrap();
    assert_eq!(writer.snapshot().items.len(), 1);

    wait_until(&reader, || reader.snapshot().items.len() == 1).await;
    assert_eq!(reader.snapshot().items[0].url, "https://github.com");

    writer.close().await;
    reader.close().await;
}
