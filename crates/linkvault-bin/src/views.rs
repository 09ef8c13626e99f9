//! Text rendering of the landing page, dashboard and bookmark list.

use chrono::{DateTime, Local, Utc};
use linkvault_auth::UserIdentity;
use linkvault_sync::{Bookmark, ListSnapshot, LoadState};

pub const EMPTY_LIST_MESSAGE: &str = "No bookmarks yet. Add one to get started!";
pub const NOT_LIVE_MESSAGE: &str =
    "Live updates are off; changes from other sessions will not appear.";

pub fn landing() -> String {
    [
        "LinkVault",
        "Your links, private and in sync everywhere.",
        "",
        "Run `linkvault login` to continue with Google.",
    ]
    .join("\n")
}

/// `[AL] Ada Lovelace`
pub fn header(user: &UserIdentity) -> String {
    format!("[{}] {}", user.initials(), user.display_name())
}

pub fn count_header(count: usize) -> String {
    format!("{} saved", count)
}

pub fn added_on(created_at: &DateTime<Utc>) -> String {
    format!(
        "Added {}",
        created_at.with_timezone(&Local).format("%b %-d, %Y")
    )
}

fn entry(bookmark: &Bookmark) -> String {
    format!(
        "  {}\n    {}\n    {} · id {}",
        bookmark.title,
        bookmark.url,
        added_on(&bookmark.created_at),
        bookmark.id
    )
}

pub fn bookmark_list(items: &[Bookmark]) -> String {
    let mut lines = vec![count_header(items.len())];
    if items.is_empty() {
        lines.push(format!("  {}", EMPTY_LIST_MESSAGE));
    }
    lines.extend(items.iter().map(entry));
    lines.join("\n")
}

pub fn inline_error(message: &str) -> String {
    format!("! {}", message)
}

/// Full dashboard: header, optional inline error, a notice when the change
/// subscription is down, then the list.
pub fn dashboard(user: &UserIdentity, snapshot: &ListSnapshot) -> String {
    let mut sections = vec![header(user)];
    if let Some(error) = &snapshot.error {
        sections.push(inline_error(error));
    }
    if !snapshot.live {
        sections.push(NOT_LIVE_MESSAGE.to_string());
    }
    sections.push(match snapshot.load_state {
        LoadState::Loading => "Loading...".to_string(),
        LoadState::Loaded => bookmark_list(&snapshot.items),
    });
    sections.join("\n\n")
}
