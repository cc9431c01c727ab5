//! Session error types.

use thiserror::Error;

use crate::state::{SessionState, Transition};

/// Errors reported by the identity provider client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Provider could not be reached.
    #[error("identity provider unreachable: {0}")]
    Unreachable(String),

    /// Provider rejected the request or the supplied tokens.
    #[error("identity provider rejected request: {0}")]
    Rejected(String),

    /// Provider refused to refresh the token (e.g. refresh token expired).
    #[error("token refresh denied")]
    RefreshDenied,

    /// Provider produced a URL that could not be parsed.
    #[error("invalid provider url: {0}")]
    InvalidUrl(String),
}

/// Result type for identity provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors that can occur during session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Provider unreachable or restored tokens rejected during initialization.
    #[error("session initialization failed: {0}")]
    Initialization(#[source] ProviderError),

    /// Authenticated, but the identity claims failed validation.
    #[error("invalid identity claims: {0}")]
    InvalidClaims(String),

    /// Provider reported an authentication failure.
    #[error("authentication failed")]
    Authentication,

    /// Provider denied a token refresh; the session is no longer valid.
    #[error("token refresh failed")]
    TokenRefresh,

    /// A lifecycle transition that is not allowed from the current state.
    #[error("transition '{transition}' not allowed from state '{from}'")]
    InvalidTransition {
        /// State the session was in.
        from: SessionState,
        /// Transition that was attempted.
        transition: Transition,
    },

    /// Token or key/value storage error.
    #[error("session storage error: {0}")]
    Storage(String),

    /// Identity provider error outside of initialization.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] kc_core::Error),
}

impl SessionError {
    /// Checks if the caller should send the user back to login.
    #[must_use]
    pub const fn requires_login(&self) -> bool {
        matches!(
            self,
            Self::Initialization(_) | Self::Authentication | Self::TokenRefresh
        )
    }

    /// Checks if this is a rejected lifecycle transition.
    #[must_use]
    pub const fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_error_is_generic() {
        assert_eq!(SessionError::TokenRefresh.to_string(), "token refresh failed");
        assert!(SessionError::TokenRefresh.requires_login());
    }

    #[test]
    fn invalid_transition_names_both_sides() {
        let err = SessionError::InvalidTransition {
            from: SessionState::Unauthenticated,
            transition: Transition::RefreshSucceeded,
        };
        assert_eq!(
            err.to_string(),
            "transition 'refresh_succeeded' not allowed from state 'unauthenticated'"
        );
        assert!(err.is_invalid_transition());
        assert!(!err.requires_login());
    }
}
