//! CLI command implementations.

mod auth;
mod bookmarks;

pub use auth::{login, logout, status};
pub use bookmarks::{add, delete, list, watch};

use crate::app::AppContext;
use crate::output::{self, OutputFormat};
use crate::routes::Route;
use crate::views;
use anyhow::{bail, Result};
use linkvault_auth::UserIdentity;
use linkvault_sync::{ErrorCategory, SyncError};
use serde_json::json;
use tracing::{debug, warn};

/// Render the public landing view.
fn show_landing(format: &OutputFormat) {
    output::print_view(
        &views::landing(),
        &json!({ "route": Route::Landing, "signed_in": false }),
        format,
    );
}

/// Signed-in user for a dashboard command; otherwise the landing view.
fn require_user(ctx: &AppContext, format: &OutputFormat) -> Result<UserIdentity> {
    match ctx.resolve(Route::Dashboard) {
        (Route::Dashboard, Some(user)) => Ok(user),
        (route, _) => {
            debug!(?route, "dashboard guard redirected");
            show_landing(format);
            bail!("Not signed in. Run `linkvault login` first.")
        }
    }
}

/// Convert a data-layer failure for `main` to print. Authentication failures
/// also send the user back to the landing view.
fn fail(err: SyncError, format: &OutputFormat) -> anyhow::Error {
    let category = err.category();
    warn!(?category, error = %err, "command failed");
    if category == ErrorCategory::Authentication {
        show_landing(format);
    }
    anyhow::Error::new(err)
}
