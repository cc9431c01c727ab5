//! Session lifecycle state machine.
//!
//! Provider notifications and manager operations are transition triggers.
//! Pairs that are not listed in [`SessionState::apply`] are rejected, so a
//! late or duplicated provider callback cannot corrupt the session.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};

/// State of the client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session; the user is anonymous.
    #[default]
    Unauthenticated,
    /// Waiting for the provider handshake.
    Authenticating,
    /// Provider confirmed the session.
    Authenticated,
    /// Background refresh failed; the session runs on a stale token.
    RefreshFailed,
    /// Session torn down, all persisted state cleared.
    LoggedOut,
}

/// Trigger that moves the session between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Provider initialization started.
    BeginInitialize,
    /// Provider initialized without a session.
    InitializedAnonymous,
    /// Provider initialization failed.
    InitializeFailed,
    /// Provider reported a successful authentication.
    AuthSucceeded,
    /// Provider reported an authentication failure.
    AuthFailed,
    /// Token refresh succeeded.
    RefreshSucceeded,
    /// Token refresh failed.
    RefreshFailed,
    /// Explicit logout.
    LoggedOut,
}

impl SessionState {
    /// Computes the state reached by applying `transition`.
    pub fn apply(self, transition: Transition) -> SessionResult<Self> {
        use SessionState as S;
        use Transition as T;

        let next = match (self, transition) {
            (S::Unauthenticated | S::LoggedOut, T::BeginInitialize) => S::Authenticating,
            (S::Authenticating, T::InitializedAnonymous | T::InitializeFailed) => {
                S::Unauthenticated
            }
            (S::Authenticating | S::Authenticated | S::RefreshFailed, T::AuthSucceeded) => {
                S::Authenticated
            }
            (S::Authenticated | S::RefreshFailed, T::RefreshSucceeded) => S::Authenticated,
            (S::Authenticated | S::RefreshFailed, T::RefreshFailed) => S::RefreshFailed,
            (_, T::AuthFailed | T::LoggedOut) => S::LoggedOut,
            (from, transition) => {
                return Err(SessionError::InvalidTransition { from, transition });
            }
        };
        Ok(next)
    }

    /// Checks if the session holds provider tokens.
    #[must_use]
    pub const fn has_tokens(self) -> bool {
        matches!(self, Self::Authenticated | Self::RefreshFailed)
    }

    /// Returns the state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::RefreshFailed => "refresh_failed",
            Self::LoggedOut => "logged_out",
        }
    }
}

impl Transition {
    /// Returns the transition name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BeginInitialize => "begin_initialize",
            Self::InitializedAnonymous => "initialized_anonymous",
            Self::InitializeFailed => "initialize_failed",
            Self::AuthSucceeded => "auth_succeeded",
            Self::AuthFailed => "auth_failed",
            Self::RefreshSucceeded => "refresh_succeeded",
            Self::RefreshFailed => "refresh_failed",
            Self::LoggedOut => "logged_out",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_to_authenticated() {
        let state = SessionState::default()
            .apply(Transition::BeginInitialize)
            .and_then(|s| s.apply(Transition::AuthSucceeded))
            .unwrap();

        assert_eq!(state, SessionState::Authenticated);
        assert!(state.has_tokens());
    }

    #[test]
    fn anonymous_initialize_returns_to_unauthenticated() {
        let state = SessionState::Authenticating
            .apply(Transition::InitializedAnonymous)
            .unwrap();
        assert_eq!(state, SessionState::Unauthenticated);
    }

    #[test]
    fn refresh_failure_is_recoverable() {
        let state = SessionState::Authenticated
            .apply(Transition::RefreshFailed)
            .unwrap();
        assert_eq!(state, SessionState::RefreshFailed);
        assert!(state.has_tokens());

        let state = state.apply(Transition::RefreshSucceeded).unwrap();
        assert_eq!(state, SessionState::Authenticated);
    }

    #[test]
    fn refresh_success_while_unauthenticated_is_rejected() {
        let err = SessionState::Unauthenticated
            .apply(Transition::RefreshSucceeded)
            .unwrap_err();

        assert!(matches!(
            err,
            SessionError::InvalidTransition {
                from: SessionState::Unauthenticated,
                transition: Transition::RefreshSucceeded,
            }
        ));
    }

    #[test]
    fn auth_success_requires_initialization() {
        assert!(SessionState::Unauthenticated
            .apply(Transition::AuthSucceeded)
            .is_err());
        assert!(SessionState::LoggedOut
            .apply(Transition::AuthSucceeded)
            .is_err());
    }

    #[test]
    fn logout_is_always_allowed() {
        for state in [
            SessionState::Unauthenticated,
            SessionState::Authenticating,
            SessionState::Authenticated,
            SessionState::RefreshFailed,
            SessionState::LoggedOut,
        ] {
            assert_eq!(
                state.apply(Transition::LoggedOut).unwrap(),
                SessionState::LoggedOut
            );
            assert_eq!(
                state.apply(Transition::AuthFailed).unwrap(),
                SessionState::LoggedOut
            );
        }
    }

    #[test]
    fn cannot_initialize_twice() {
        assert!(SessionState::Authenticated
            .apply(Transition::BeginInitialize)
            .is_err());
    }
}
