//! Bookmark data access and live synchronization for LinkVault.
//!
//! - [`BookmarkRepository`]: owner-scoped list/create/delete over a
//!   [`BookmarkBackend`] (PostgREST in production).
//! - [`ChangeListener`]: runs a [`ChangeFeed`] subscription and calls back on
//!   every change; the Realtime websocket feed lives in [`realtime`].
//! - [`LiveBookmarkList`]: local list state reconciled by re-fetching.

mod backend;
mod error;
mod listener;
mod live_list;
mod models;
pub mod realtime;
mod repository;
mod rest;
mod validation;

pub use backend::{AccessTokenProvider, BookmarkBackend, ChangeFeed, ChangeStream};
pub use error::{ErrorCategory, SyncError, SyncResult};
pub use listener::{ChangeListener, Notification, Subscription};
pub use live_list::{ListSnapshot, LiveBookmarkList, LoadState};
pub use models::{Bookmark, ChangeEvent, ChangeKind, NewBookmark};
pub use realtime::RealtimeFeed;
pub use repository::BookmarkRepository;
pub use rest::SupabaseRestClient;
pub use validation::{validate_new_bookmark, ValidationError};
