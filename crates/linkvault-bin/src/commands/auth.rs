//! Sign-in, sign-out and session status.

use super::{fail, show_landing};
use crate::app::AppContext;
use crate::output::{self, OutputFormat};
use crate::routes::{after_callback, CallbackResolution, Route};
use crate::views;
use anyhow::{bail, Result};
use linkvault_auth::{CallbackOutcome, CallbackServer};
use serde_json::json;
use tracing::{info, warn};

/// Browser sign-in through the local redirect listener.
pub async fn login(ctx: &AppContext, format: &OutputFormat) -> Result<()> {
    if let (Route::Dashboard, Some(user)) = ctx.resolve(Route::Dashboard) {
        match ctx.session.restore().await {
            Ok(true) => {
                output::print_success(
                    &format!("Already signed in as {}", user.display_name()),
                    format,
                );
                return Ok(());
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, "stored session unusable, signing in again"),
        }
    }

    let server = CallbackServer::bind(ctx.config.callback_port).await?;
    let redirect_to = server.callback_url()?;
    let authorize_url = ctx.session.begin_sign_in(&redirect_to)?;

    if let Err(e) = open::that(&authorize_url) {
        warn!(error = %e, "could not open browser");
    }
    output::print_success(
        &format!(
            "Continue in your browser. If it did not open, visit:\n{}",
            authorize_url
        ),
        format,
    );

    let outcome = server.wait_for_callback().await;
    info!(route = ?Route::AuthCallback, ok = outcome.is_ok(), "sign-in redirect handled");
    let resolution = match outcome {
        Ok(CallbackOutcome::Code(code)) => {
            match ctx.session.exchange_authorization_code(&code).await {
                Ok(user) => {
                    info!(user_id = %user.id, "sign-in complete");
                    CallbackResolution::Exchanged
                }
                Err(e) => {
                    output::print_error(&format!("Sign-in failed: {}", e), format);
                    CallbackResolution::ExchangeFailed
                }
            }
        }
        Ok(CallbackOutcome::Error { error, description }) => {
            output::print_error(
                &format!("Sign-in failed: {}", description.unwrap_or(error)),
                format,
            );
            CallbackResolution::ExchangeFailed
        }
        Ok(CallbackOutcome::Missing) => CallbackResolution::NoCode,
        Err(e) => {
            output::print_error(&format!("Sign-in failed: {}", e), format);
            CallbackResolution::ExchangeFailed
        }
    };

    let has_session = ctx.session.current_user()?.is_some();
    match ctx.resolve(after_callback(resolution, has_session)) {
        (Route::Dashboard, Some(user)) => {
            output::print_view(
                &format!("{}\n\nSigned in.", views::header(&user)),
                &json!({ "route": Route::Dashboard, "signed_in": true, "user": user }),
                format,
            );
            Ok(())
        }
        _ => {
            show_landing(format);
            bail!("Sign-in did not complete")
        }
    }
}

/// Sign out remotely (best effort) and locally.
pub async fn logout(ctx: &AppContext, format: &OutputFormat) -> Result<()> {
    ctx.session
        .sign_out()
        .await
        .map_err(|e| fail(e.into(), format))?;
    output::print_success("Signed out", format);
    show_landing(format);
    Ok(())
}

/// Validate the stored session with the server and show who is signed in.
pub async fn status(ctx: &AppContext, format: &OutputFormat) -> Result<()> {
    match ctx.session.restore().await {
        Ok(true) => {
            let (route, user) = ctx.resolve(Route::Dashboard);
            let Some(user) = user else {
                show_landing(format);
                return Ok(());
            };
            let state = ctx.session.state();
            output::print_view(
                &format!(
                    "{}\nSession: {:?}\nStored in: {}",
                    views::header(&user),
                    state,
                    ctx.paths.session_file().display()
                ),
                &json!({
                    "route": route,
                    "signed_in": true,
                    "state": format!("{:?}", state),
                    "user": user,
                    "session_file": ctx.paths.session_file(),
                }),
                format,
            );
            Ok(())
        }
        Ok(false) => {
            show_landing(format);
            Ok(())
        }
        Err(e) => {
            output::print_error(&format!("Session is no longer valid: {}", e), format);
            show_landing(format);
            Ok(())
        }
    }
}
