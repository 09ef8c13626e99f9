//! Dashboard commands: list, add, delete and the live watch view.

use super::{fail, require_user};
use crate::app::AppContext;
use crate::output::{self, OutputFormat};
use crate::views;
use anyhow::Result;
use linkvault_auth::UserIdentity;
use linkvault_sync::{LiveBookmarkList, SyncError};
use serde_json::json;
use tracing::info;

async fn render_list(ctx: &AppContext, user: &UserIdentity, format: &OutputFormat) -> Result<()> {
    let items = ctx
        .repository
        .list(&user.id)
        .await
        .map_err(|e| fail(e, format))?;
    output::print_view(
        &format!("{}\n\n{}", views::header(user), views::bookmark_list(&items)),
        &items,
        format,
    );
    Ok(())
}

pub async fn list(ctx: &AppContext, format: &OutputFormat) -> Result<()> {
    let user = require_user(ctx, format)?;
    render_list(ctx, &user, format).await
}

/// Validation failures are reported without any network call.
pub async fn add(ctx: &AppContext, title: &str, url: &str, format: &OutputFormat) -> Result<()> {
    let user = require_user(ctx, format)?;
    ctx.repository
        .create(&user.id, title, url)
        .await
        .map_err(|e| fail(e, format))?;
    output::print_success("Bookmark saved", format);
    render_list(ctx, &user, format).await
}

pub async fn delete(ctx: &AppContext, id: &str, format: &OutputFormat) -> Result<()> {
    require_user(ctx, format)?;
    ctx.repository
        .delete(id)
        .await
        .map_err(|e| fail(e, format))?;
    output::print_success("Bookmark deleted", format);
    Ok(())
}

/// Live dashboard. Re-renders on every list change until Ctrl-C.
pub async fn watch(ctx: &AppContext, format: &OutputFormat) -> Result<()> {
    let user = require_user(ctx, format)?;
    // Surface an unusable session before opening the subscription.
    ctx.session
        .access_token()
        .await
        .map_err(|e| fail(SyncError::from(e), format))?;

    let list = LiveBookmarkList::open(ctx.repository.clone(), &ctx.listener, &user.id).await;
    let mut versions = list.subscribe_versions();
    info!(user_id = %user.id, live = list.is_live(), "watching bookmarks");

    render_live(&list, &user, format);
    versions.borrow_and_update();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = versions.changed() => {
                if changed.is_err() {
                    break;
                }
                render_live(&list, &user, format);
                versions.borrow_and_update();
            }
        }
    }

    list.close().await;
    output::print_success("Stopped watching", format);
    Ok(())
}

/// Errors are shown once, then dismissed.
fn render_live(list: &LiveBookmarkList, user: &UserIdentity, format: &OutputFormat) {
    let snapshot = list.snapshot();
    if *format == OutputFormat::Text {
        println!("{}", "-".repeat(50));
    }
    output::print_view(
        &views::dashboard(user, &snapshot),
        &json!({
            "items": snapshot.items,
            "error": snapshot.error,
            "live": snapshot.live,
        }),
        format,
    );
    if snapshot.error.is_some() {
        list.dismiss_error();
    }
}
