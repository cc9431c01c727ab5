//! Session context shared with the UI layer.
//!
//! The application creates one [`SessionContext`], hands it to the
//! [`SessionManager`](crate::SessionManager) and gives the UI an
//! `Arc<dyn SessionView>`. The manager is the only writer. Readers either
//! take a [`SessionSnapshot`] or subscribe to changes.

use std::sync::Arc;

use async_trait::async_trait;
use kc_core::ProviderUrls;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::claims::UserProfile;
use crate::error::SessionResult;
use crate::state::SessionState;

/// A party the user may act on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Representation {
    /// Identifier of the represented party.
    pub id: String,
    /// Display name of the represented party.
    pub name: String,
}

/// Fetches the parties a user may represent.
#[async_trait]
pub trait RepresentationsLoader: Send + Sync {
    /// Loads representations for `profile`.
    async fn load(&self, profile: &UserProfile) -> SessionResult<Vec<Representation>>;
}

/// Refreshes the access token on behalf of the UI.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Refreshes the token if it expires within `min_validity` seconds.
    ///
    /// `Ok(true)` both when a refresh happened and when none was needed.
    async fn update_token(&self, min_validity: u32) -> SessionResult<bool>;
}

/// Starts a login at the higher assurance level.
#[async_trait]
pub trait StepUpLogin: Send + Sync {
    /// Logs out and redirects to a login requiring the higher level.
    async fn login_at_high_assurance(&self) -> SessionResult<()>;
}

/// Point-in-time view of the session state visible to the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Lifecycle state.
    pub state: SessionState,
    /// Profile of the logged-in user.
    pub profile: Option<UserProfile>,
    /// Session expired; the user should log in again.
    pub login_error: bool,
    /// Generic error, e.g. rejected identity claims.
    pub error: bool,
    /// External service origins.
    pub urls: Option<ProviderUrls>,
    /// Parties the user may represent.
    pub representatives: Vec<Representation>,
    /// Whether step-up login is offered.
    pub step_up_available: bool,
}

/// Read side of the session context.
pub trait SessionView: Send + Sync {
    /// Returns the current snapshot.
    fn snapshot(&self) -> SessionSnapshot;

    /// Subscribes to snapshot changes.
    fn subscribe(&self) -> watch::Receiver<SessionSnapshot>;

    /// Returns the token refresh handle, once initialized.
    fn token_refresher(&self) -> Option<Arc<dyn TokenRefresher>>;

    /// Returns the step-up login handle, once authenticated.
    fn step_up(&self) -> Option<Arc<dyn StepUpLogin>>;

    /// Returns the profile of the logged-in user.
    fn profile(&self) -> Option<UserProfile> {
        self.snapshot().profile
    }

    /// Returns whether the generic error flag is set.
    fn has_error(&self) -> bool {
        self.snapshot().error
    }

    /// Returns whether the session-expired flag is set.
    fn has_login_error(&self) -> bool {
        self.snapshot().login_error
    }

    /// Returns whether no representations are known.
    fn has_no_representatives(&self) -> bool {
        self.snapshot().representatives.is_empty()
    }
}

/// Session context owned by the application.
pub struct SessionContext {
    snapshot: watch::Sender<SessionSnapshot>,
    token_refresher: RwLock<Option<Arc<dyn TokenRefresher>>>,
    step_up: RwLock<Option<Arc<dyn StepUpLogin>>>,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("snapshot", &*self.snapshot.borrow())
            .field("token_refresher", &self.token_refresher.read().is_some())
            .finish_non_exhaustive()
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

impl SessionContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(SessionSnapshot::default());
        Self {
            snapshot,
            token_refresher: RwLock::new(None),
            step_up: RwLock::new(None),
        }
    }

    /// Sets the lifecycle state.
    pub fn set_state(&self, state: SessionState) {
        self.snapshot
            .send_if_modified(|s| replace(&mut s.state, state));
    }

    /// Publishes or clears the user profile.
    pub fn set_profile(&self, profile: Option<UserProfile>) {
        self.snapshot
            .send_if_modified(|s| replace(&mut s.profile, profile));
    }

    /// Sets the generic error flag.
    pub fn set_error(&self, error: bool) {
        self.snapshot
            .send_if_modified(|s| replace(&mut s.error, error));
    }

    /// Sets the session-expired flag.
    pub fn set_login_error(&self, login_error: bool) {
        self.snapshot
            .send_if_modified(|s| replace(&mut s.login_error, login_error));
    }

    /// Publishes the external service origins.
    pub fn set_urls(&self, urls: ProviderUrls) {
        self.snapshot
            .send_if_modified(|s| replace(&mut s.urls, Some(urls)));
    }

    /// Replaces the known representations.
    pub fn set_representatives(&self, representatives: Vec<Representation>) {
        self.snapshot
            .send_if_modified(|s| replace(&mut s.representatives, representatives));
    }

    /// Publishes the token refresh handle.
    pub fn set_token_refresher(&self, refresher: Arc<dyn TokenRefresher>) {
        *self.token_refresher.write() = Some(refresher);
    }

    /// Publishes the step-up login handle.
    pub fn set_step_up(&self, step_up: Arc<dyn StepUpLogin>) {
        *self.step_up.write() = Some(step_up);
        self.snapshot
            .send_if_modified(|s| replace(&mut s.step_up_available, true));
    }

    /// Clears everything tied to the logged-in user.
    ///
    /// The error flags survive so the UI can still explain why the session
    /// ended.
    pub fn clear_session(&self) {
        *self.step_up.write() = None;
        self.snapshot.send_if_modified(|s| {
            let changed = s.profile.is_some()
                || s.urls.is_some()
                || !s.representatives.is_empty()
                || s.step_up_available;
            s.profile = None;
            s.urls = None;
            s.representatives.clear();
            s.step_up_available = false;
            changed
        });
    }
}

impl SessionView for SessionContext {
    fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.subscribe()
    }

    fn token_refresher(&self) -> Option<Arc<dyn TokenRefresher>> {
        self.token_refresher.read().clone()
    }

    fn step_up(&self) -> Option<Arc<dyn StepUpLogin>> {
        self.step_up.read().clone()
    }

    fn profile(&self) -> Option<UserProfile> {
        self.snapshot.borrow().profile.clone()
    }

    fn has_error(&self) -> bool {
        self.snapshot.borrow().error
    }

    fn has_login_error(&self) -> bool {
        self.snapshot.borrow().login_error
    }

    fn has_no_representatives(&self) -> bool {
        self.snapshot.borrow().representatives.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> UserProfile {
        UserProfile {
            id: "01019012345".to_string(),
            first_name: "Ola".to_string(),
            last_name: "Nordmann".to_string(),
            assurance_level: 4,
            email: None,
        }
    }

    #[test]
    fn new_context_is_empty() {
        let context = SessionContext::new();
        let snapshot = context.snapshot();

        assert_eq!(snapshot, SessionSnapshot::default());
        assert!(context.has_no_representatives());
        assert!(context.token_refresher().is_none());
        assert!(context.step_up().is_none());
    }

    #[test]
    fn subscribers_see_changes() {
        let context = SessionContext::new();
        let mut rx = context.subscribe();
        assert!(!rx.has_changed().unwrap());

        context.set_profile(Some(profile()));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().profile, Some(profile()));
    }

    #[test]
    fn unchanged_values_do_not_notify() {
        let context = SessionContext::new();
        let mut rx = context.subscribe();

        context.set_error(false);
        context.set_login_error(false);
        assert!(!rx.has_changed().unwrap());

        context.set_error(true);
        assert!(rx.has_changed().unwrap());
        let _ = rx.borrow_and_update();

        context.set_error(true);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn clear_session_keeps_error_flags() {
        let context = SessionContext::new();
        context.set_profile(Some(profile()));
        context.set_urls(ProviderUrls::default());
        context.set_representatives(vec![Representation {
            id: "910000000".to_string(),
            name: "Bakeriet AS".to_string(),
        }]);
        context.set_login_error(true);

        context.clear_session();

        let snapshot = context.snapshot();
        assert!(snapshot.profile.is_none());
        assert!(snapshot.urls.is_none());
        assert!(snapshot.representatives.is_empty());
        assert!(snapshot.login_error);
    }
}
