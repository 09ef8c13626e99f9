//! Authentication state machine using rust-fsm.
//!
//! ```text
//! SignedOut   Restore          -> Restoring
//!             ExchangeStarted  -> Exchanging
//!             SignOutRequested -> SigningOut
//! Restoring   TokenValid       -> Verifying
//!             TokenExpired     -> Refreshing
//!             NoSession        -> SignedOut
//! Verifying   ServerVerified   -> SignedIn
//!             ServerRejected   -> SignedOut
//! Exchanging  ExchangeSucceeded -> SignedIn
//!             ExchangeFailed   -> SignedOut
//! SignedIn    Restore          -> Restoring
//!             TokenExpired     -> Refreshing
//!             ExchangeStarted  -> Exchanging
//!             SignOutRequested -> SigningOut
//! Refreshing  RefreshSucceeded -> SignedIn
//!             RefreshRetry     -> Refreshing
//!             RefreshFailed    -> SignedOut
//! SigningOut  SignOutComplete  -> SignedOut
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub auth_machine(SignedOut)

    SignedOut => {
        Restore => Restoring,
        ExchangeStarted => Exchanging,
        SignOutRequested => SigningOut
    },
    Restoring => {
        TokenValid => Verifying,
        TokenExpired => Refreshing,
        NoSession => SignedOut
    },
    Verifying => {
        ServerVerified => SignedIn,
        ServerRejected => SignedOut
    },
    Exchanging => {
        ExchangeSucceeded => SignedIn,
        ExchangeFailed => SignedOut
    },
    SignedIn => {
        Restore => Restoring,
        TokenExpired => Refreshing,
        ExchangeStarted => Exchanging,
        SignOutRequested => SigningOut
    },
    Refreshing => {
        RefreshSucceeded => SignedIn,
        RefreshRetry => Refreshing,
        RefreshFailed => SignedOut
    },
    SigningOut => {
        SignOutComplete => SignedOut
    }
}

pub use auth_machine::Input as AuthMachineInput;
pub use auth_machine::State as AuthMachineState;
pub use auth_machine::StateMachine as AuthMachine;

/// Public view of the FSM state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    SignedOut,
    /// Inspecting the persisted session.
    Restoring,
    /// Confirming the persisted session with the auth service.
    Verifying,
    /// Redeeming an authorization code.
    Exchanging,
    SignedIn,
    Refreshing,
    SigningOut,
}

impl AuthState {
    /// Returns true only for `SignedIn`.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::SignedIn)
    }

    /// Returns true if the state is an in-progress state.
    pub fn is_transient(&self) -> bool {
        !matches!(self, AuthState::SignedOut | AuthState::SignedIn)
    }
}

impl From<&AuthMachineState> for AuthState {
    fn from(state: &AuthMachineState) -> Self {
        match state {
            AuthMachineState::SignedOut => AuthState::SignedOut,
            AuthMachineState::Restoring => AuthState::Restoring,
            AuthMachineState::Verifying => AuthState::Verifying,
            AuthMachineState::Exchanging => AuthState::Exchanging,
            AuthMachineState::SignedIn => AuthState::SignedIn,
            AuthMachineState::Refreshing => AuthState::Refreshing,
            AuthMachineState::SigningOut => AuthState::SigningOut,
        }
    }
}

/// Configuration for retry behavior during token refresh.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Maximum number of attempts.
    pub max_retries: u32,
    /// Initial delay between retries in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

impl RefreshConfig {
    /// Delay before retry `attempt` (0-indexed), doubling up to the cap.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self
            .initial_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}
