//! View routing and the dashboard guard.

use linkvault_auth::UserIdentity;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Public page shown without a session.
    Landing,
    /// Local OAuth redirect target.
    AuthCallback,
    /// Protected bookmark dashboard.
    Dashboard,
}

/// How the redirect callback ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackResolution {
    Exchanged,
    ExchangeFailed,
    NoCode,
}

/// Resolve the route actually shown for `requested`.
///
/// The dashboard is only reachable with a session.
pub fn guard(requested: Route, user: Option<&UserIdentity>) -> Route {
    match (requested, user) {
        (Route::Dashboard, None) => Route::Landing,
        (route, _) => route,
    }
}

/// Where the callback sends the browser session next. A callback without a
/// code still goes to the dashboard when a session already exists; the
/// guard re-checks it there.
pub fn after_callback(resolution: CallbackResolution, has_session: bool) -> Route {
    match resolution {
        CallbackResolution::Exchanged => Route::Dashboard,
        CallbackResolution::ExchangeFailed => Route::Landing,
        CallbackResolution::NoCode if has_session => Route::Dashboard,
        CallbackResolution::NoCode => Route::Landing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserIdentity {
        UserIdentity {
            id: "user-1".into(),
            email: Some("ada@example.com".into()),
            full_name: None,
        }
    }

    #[test]
    fn test_dashboard_without_session_redirects_to_landing() {
        assert_eq!(guard(Route::Dashboard, None), Route::Landing);
        assert_eq!(guard(Route::Dashboard, Some(&user())), Route::Dashboard);
    }

    #[test]
    fn test_public_routes_pass_through() {
        for route in [Route::Landing, Route::AuthCallback] {
            assert_eq!(guard(route, None), route);
            assert_eq!(guard(route, Some(&user())), route);
        }
    }

    #[test]
    fn test_after_callback() {
        assert_eq!(after_callback(CallbackResolution::Exchanged, true), Route::Dashboard);
        assert_eq!(after_callback(CallbackResolution::ExchangeFailed, true), Route::Landing);
        assert_eq!(after_callback(CallbackResolution::ExchangeFailed, false), Route::Landing);
        assert_eq!(after_callback(CallbackResolution::NoCode, true), Route::Dashboard);
        assert_eq!(after_callback(CallbackResolution::NoCode, false), Route::Landing);
    }

    #[test]
    fn test_callback_without_session_ends_on_landing_after_guard() {
        let next = after_callback(CallbackResolution::NoCode, true);
        // Session vanished between the callback and the dashboard render.
        assert_eq!(guard(next, None), Route::Landing);
    }
}
