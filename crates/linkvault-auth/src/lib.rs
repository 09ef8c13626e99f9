//! Session store for LinkVault.
//!
//! Owns the authenticated identity of the CLI:
//! - PKCE sign-in through the identity provider ([`SessionStore::begin_sign_in`])
//! - code exchange on the local redirect callback ([`CallbackServer`])
//! - restore, transparent refresh and sign-out of the persisted session
//!
//! State transitions are tracked by an explicit FSM ([`auth_fsm`]).

pub mod auth_fsm;
mod error;
mod gotrue;
mod identity;
mod oauth;
mod pkce;
mod session;

pub use auth_fsm::{AuthState, RefreshConfig};
pub use error::{AuthError, AuthResult};
pub use gotrue::{AuthApi, AuthUser, GoTrueClient, TokenGrant, UserMetadata};
pub use identity::UserIdentity;
pub use oauth::{CallbackOutcome, CallbackServer, CALLBACK_PATH, DEFAULT_CALLBACK_TIMEOUT_SECS};
pub use pkce::PkcePair;
pub use session::SessionStore;
