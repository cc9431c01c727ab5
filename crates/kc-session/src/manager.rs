//! Session manager.
//!
//! Sequences calls into the identity provider client, applies the
//! resulting lifecycle transitions, keeps the persisted token set in step
//! with the live session and publishes the user-visible state into the
//! [`SessionContext`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use kc_core::{Event, EventBuilder, EventType, SessionConfig};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::claims::UserProfile;
use crate::context::{
    RepresentationsLoader, SessionContext, SessionView, StepUpLogin, TokenRefresher,
};
use crate::error::{SessionError, SessionResult};
use crate::provider::{
    IdentityProviderClient, InitOptions, LoginOptions, LogoutOptions, OnLoad, ProviderEvent,
};
use crate::state::{SessionState, Transition};
use crate::storage::{KeyValueStore, MemoryStore};
use crate::token::PersistedTokenSet;

/// Default minimum token validity in seconds for [`SessionManager::update_token`].
pub const DEFAULT_MIN_VALIDITY: u32 = kc_core::config::DEFAULT_MIN_TOKEN_VALIDITY;

/// Query parameter carrying the requested authentication context.
const ACR_VALUES_PARAM: &str = "acr_values";

/// Builder for [`SessionManager`].
pub struct SessionManagerBuilder {
    config: SessionConfig,
    provider: Arc<dyn IdentityProviderClient>,
    session_store: Option<Arc<dyn KeyValueStore>>,
    local_store: Option<Arc<dyn KeyValueStore>>,
    context: Option<Arc<SessionContext>>,
    representations: Option<Arc<dyn RepresentationsLoader>>,
}

impl SessionManagerBuilder {
    /// Sets the session-scoped store holding the persisted tokens.
    #[must_use]
    pub fn session_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    /// Sets the long-lived auxiliary store, cleared on logout.
    #[must_use]
    pub fn local_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.local_store = Some(store);
        self
    }

    /// Sets the context shared with the UI layer.
    #[must_use]
    pub fn context(mut self, context: Arc<SessionContext>) -> Self {
        self.context = Some(context);
        self
    }

    /// Sets the loader used to fetch representations after login.
    #[must_use]
    pub fn representations_loader(mut self, loader: Arc<dyn RepresentationsLoader>) -> Self {
        self.representations = Some(loader);
        self
    }

    /// Builds the manager.
    ///
    /// Stores and context that were not set default to fresh in-memory ones.
    pub fn build(self) -> SessionResult<SessionManager> {
        self.config.validate()?;

        Ok(SessionManager {
            inner: Arc::new(Inner {
                config: self.config,
                provider: self.provider,
                session_store: self
                    .session_store
                    .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn KeyValueStore>),
                local_store: self
                    .local_store
                    .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn KeyValueStore>),
                context: self.context.unwrap_or_default(),
                representations: self.representations,
                representations_pending: Arc::new(AtomicBool::new(false)),
                state: Mutex::new(SessionState::default()),
            }),
        })
    }
}

struct Inner {
    config: SessionConfig,
    provider: Arc<dyn IdentityProviderClient>,
    session_store: Arc<dyn KeyValueStore>,
    local_store: Arc<dyn KeyValueStore>,
    context: Arc<SessionContext>,
    representations: Option<Arc<dyn RepresentationsLoader>>,
    /// Set while a representations fetch is running.
    representations_pending: Arc<AtomicBool>,
    state: Mutex<SessionState>,
}

/// Manages the client session for one application instance.
///
/// Cloning is cheap; clones share the same session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("realm", &self.inner.config.realm)
            .field("client_id", &self.inner.config.client_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Starts building a manager for `provider`.
    #[must_use]
    pub fn builder(
        config: SessionConfig,
        provider: Arc<dyn IdentityProviderClient>,
    ) -> SessionManagerBuilder {
        SessionManagerBuilder {
            config,
            provider,
            session_store: None,
            local_store: None,
            context: None,
            representations: None,
        }
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.inner.state.lock()
    }

    /// Returns the context shared with the UI layer.
    #[must_use]
    pub fn context(&self) -> &Arc<SessionContext> {
        &self.inner.context
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    // === Operations ===

    /// Initializes the provider client with the persisted tokens.
    ///
    /// Uses a silent SSO check. Returns `true` and publishes the user-visible
    /// state when a session was established, `false` for an anonymous user.
    /// Provider failures are returned as [`SessionError::Initialization`]
    /// without retrying.
    ///
    /// Any failure leaves the session `Unauthenticated`, so initialization
    /// can be attempted again.
    pub async fn initialize(&self) -> SessionResult<bool> {
        self.inner
            .context
            .set_token_refresher(Arc::new(ManagerHandle::new(&self.inner)));

        let tokens = PersistedTokenSet::load(self.inner.session_store.as_ref())?;
        self.transition(Transition::BeginInitialize)?;
        tracing::debug!(restored = !tokens.is_empty(), "initializing identity provider");

        let options = InitOptions {
            on_load: OnLoad::CheckSso,
            tokens,
        };

        match self.inner.provider.init(options).await {
            Ok(true) => match self.on_authentication_succeeded() {
                Ok(()) => Ok(true),
                Err(e) => {
                    self.inner.provider.clear_token();
                    self.abort_initialize(&e);
                    Err(e)
                }
            },
            Ok(false) => {
                self.transition(Transition::InitializedAnonymous)?;
                self.event(EventType::SessionRestored)
                    .detail("authenticated", "false")
                    .build()
                    .emit();
                Ok(false)
            }
            Err(e) => {
                let error = SessionError::Initialization(e);
                self.abort_initialize(&error);
                Err(error)
            }
        }
    }

    /// Starts a redirect login that returns to `redirect_uri`.
    pub async fn login(&self, redirect_uri: &str) -> SessionResult<()> {
        tracing::debug!(redirect_uri, "starting login");
        self.inner
            .provider
            .login(LoginOptions {
                redirect_uri: Some(redirect_uri.to_string()),
            })
            .await?;
        Ok(())
    }

    /// Forces a new login at the higher assurance level.
    ///
    /// Logs out at the provider with the login URL, extended by the
    /// configured `acr_values`, as the post-logout redirect.
    pub async fn login_at_high_assurance(&self) -> SessionResult<()> {
        let mut login_url = self
            .inner
            .provider
            .create_login_url(&LoginOptions::default())?;
        login_url
            .query_pairs_mut()
            .append_pair(ACR_VALUES_PARAM, &self.inner.config.high_assurance_acr);

        self.event(EventType::StepUpLogin)
            .detail("acr", self.inner.config.high_assurance_acr.as_str())
            .build()
            .emit();

        self.inner
            .provider
            .logout(LogoutOptions {
                redirect_uri: Some(login_url.to_string()),
            })
            .await?;
        Ok(())
    }

    /// Ends the session and redirects to `redirect_uri` via the provider.
    ///
    /// The provider's in-memory token, the session store and the auxiliary
    /// store are all cleared before the provider logout is requested, even
    /// if one of the stores fails.
    pub async fn logout(&self, redirect_uri: Option<&str>) -> SessionResult<()> {
        self.transition(Transition::LoggedOut)?;

        self.inner.provider.clear_token();
        let session_cleared = self.inner.session_store.clear();
        let local_cleared = self.inner.local_store.clear();
        self.inner.context.clear_session();

        self.inner
            .provider
            .logout(LogoutOptions {
                redirect_uri: redirect_uri.map(str::to_string),
            })
            .await?;

        self.event(EventType::Logout).build().emit();
        session_cleared?;
        local_cleared
    }

    /// Refreshes the token if it expires within `min_validity` seconds.
    ///
    /// Resolves `true` whether or not a refresh was needed. A refresh
    /// re-persists all three tokens. A refusal by the provider sets the
    /// session-expired flag and returns [`SessionError::TokenRefresh`];
    /// the caller should send the user to login.
    pub async fn update_token(&self, min_validity: u32) -> SessionResult<bool> {
        match self.inner.provider.update_token(min_validity).await {
            Ok(true) => {
                self.on_refresh_succeeded()?;
                Ok(true)
            }
            Ok(false) => {
                tracing::trace!(min_validity, "token still valid");
                Ok(true)
            }
            Err(e) => {
                tracing::debug!(error = %e, "token refresh rejected");
                if let Err(err) = self.on_refresh_failed() {
                    tracing::debug!(error = %err, "refresh failure not recorded");
                }
                Err(SessionError::TokenRefresh)
            }
        }
    }

    /// [`update_token`](Self::update_token) with the configured minimum validity.
    pub async fn ensure_fresh_token(&self) -> SessionResult<bool> {
        self.update_token(self.inner.config.min_token_validity).await
    }

    // === Provider callbacks ===

    /// Handles a successful authentication.
    ///
    /// Persists the tokens and publishes the step-up handle, cleared login
    /// error and service origins. Valid claims publish the [`UserProfile`]
    /// and, when no representations are known, start fetching them in the
    /// background. Invalid claims set the generic error flag instead.
    ///
    /// The state only moves to `Authenticated` once the tokens are stored.
    pub fn on_authentication_succeeded(&self) -> SessionResult<()> {
        let provider = &self.inner.provider;
        let context = &self.inner.context;

        self.transition_with(Transition::AuthSucceeded, || {
            provider.tokens().persist(self.inner.session_store.as_ref())
        })?;
        context.set_step_up(Arc::new(ManagerHandle::new(&self.inner)));
        context.set_login_error(false);
        context.set_urls(self.inner.config.provider_urls.clone());

        let profile = match provider.id_token_claims() {
            Some(claims) => UserProfile::from_claims(&claims),
            None => Err(SessionError::InvalidClaims("no id token claims".to_string())),
        };

        match profile {
            Ok(profile) => {
                self.event(EventType::Login)
                    .detail("assurance_level", profile.assurance_level.to_string())
                    .build()
                    .emit();
                context.set_profile(Some(profile.clone()));
                if context.has_no_representatives() {
                    self.fetch_representations(profile);
                }
            }
            Err(e) => {
                self.event(EventType::ClaimsRejected)
                    .failure(e.to_string())
                    .build()
                    .emit();
                context.set_error(true);
            }
        }
        Ok(())
    }

    /// Handles an authentication failure by logging out without a redirect.
    pub async fn on_authentication_failed(&self) -> SessionResult<()> {
        self.transition(Transition::AuthFailed)?;
        self.event(EventType::LoginError)
            .failure(SessionError::Authentication.to_string())
            .build()
            .emit();
        self.logout(None).await
    }

    /// Handles a successful token refresh by re-persisting the tokens.
    pub fn on_refresh_succeeded(&self) -> SessionResult<()> {
        self.transition_with(Transition::RefreshSucceeded, || {
            self.inner
                .provider
                .tokens()
                .persist(self.inner.session_store.as_ref())
        })?;
        self.event(EventType::RefreshToken).build().emit();
        Ok(())
    }

    /// Handles a failed token refresh by setting the session-expired flag.
    ///
    /// The session continues on the stale token.
    pub fn on_refresh_failed(&self) -> SessionResult<()> {
        self.transition(Transition::RefreshFailed)?;
        self.inner.context.set_login_error(true);
        tracing::error!("User session has expired");
        self.event(EventType::RefreshTokenError)
            .failure(SessionError::TokenRefresh.to_string())
            .build()
            .emit();
        Ok(())
    }

    /// Dispatches a provider notification to its handler.
    pub async fn handle_event(&self, event: ProviderEvent) -> SessionResult<()> {
        tracing::debug!(?event, state = %self.state(), "provider event");
        match event {
            ProviderEvent::AuthSuccess => self.on_authentication_succeeded(),
            ProviderEvent::AuthError => self.on_authentication_failed().await,
            ProviderEvent::AuthRefreshSuccess => self.on_refresh_succeeded(),
            ProviderEvent::AuthRefreshError => self.on_refresh_failed(),
        }
    }

    /// Handles provider notifications until the sender side closes.
    pub async fn run_events(&self, mut events: mpsc::UnboundedReceiver<ProviderEvent>) {
        while let Some(event) = events.recv().await {
            if let Err(e) = self.handle_event(event).await {
                tracing::warn!(?event, error = %e, "provider event not handled");
            }
        }
        tracing::debug!("provider event channel closed");
    }

    // === Internals ===

    fn transition(&self, transition: Transition) -> SessionResult<SessionState> {
        self.transition_with(transition, || Ok(()))
    }

    /// Applies `transition` after `effect` succeeds.
    ///
    /// A rejected transition skips `effect`; a failed `effect` keeps the
    /// current state.
    fn transition_with(
        &self,
        transition: Transition,
        effect: impl FnOnce() -> SessionResult<()>,
    ) -> SessionResult<SessionState> {
        let mut state = self.inner.state.lock();
        let from = *state;
        let next = from.apply(transition).inspect_err(|e| {
            tracing::warn!(state = %from, %transition, error = %e, "rejected session transition");
        })?;
        effect().inspect_err(|e| {
            tracing::warn!(state = %from, %transition, error = %e, "session transition aborted");
        })?;
        *state = next;
        drop(state);

        tracing::debug!(from = %from, to = %next, %transition, "session transition");
        self.inner.context.set_state(next);
        Ok(next)
    }

    /// Returns the session to `Unauthenticated` after a failed initialization.
    fn abort_initialize(&self, error: &SessionError) {
        tracing::error!(%error, "session initialization failed");
        if let Err(e) = self.transition(Transition::InitializeFailed) {
            tracing::debug!(error = %e, "initialization rollback not applied");
        }
        self.event(EventType::SessionRestored)
            .failure(error.to_string())
            .build()
            .emit();
    }

    fn event(&self, event_type: EventType) -> EventBuilder {
        Event::builder(event_type)
            .realm(self.inner.config.realm.as_str())
            .client(self.inner.config.client_id.as_str())
    }

    fn fetch_representations(&self, profile: UserProfile) {
        let Some(loader) = self.inner.representations.clone() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no async runtime, representations not fetched");
            return;
        };
        if self.inner.representations_pending.swap(true, Ordering::AcqRel) {
            tracing::debug!("representations fetch already in progress");
            return;
        }

        let context = Arc::clone(&self.inner.context);
        let pending = Arc::clone(&self.inner.representations_pending);
        runtime.spawn(async move {
            match loader.load(&profile).await {
                Ok(representatives) => {
                    tracing::debug!(count = representatives.len(), "representations loaded");
                    context.set_representatives(representatives);
                }
                Err(e) => tracing::warn!(error = %e, "failed to load representations"),
            }
            pending.store(false, Ordering::Release);
        });
    }
}

/// Handle published into the context.
///
/// Holds the manager weakly so the context does not keep it alive.
struct ManagerHandle {
    inner: Weak<Inner>,
}

impl ManagerHandle {
    fn new(inner: &Arc<Inner>) -> Self {
        Self {
            inner: Arc::downgrade(inner),
        }
    }

    fn manager(&self) -> Option<SessionManager> {
        self.inner.upgrade().map(|inner| SessionManager { inner })
    }
}

#[async_trait]
impl TokenRefresher for ManagerHandle {
    async fn update_token(&self, min_validity: u32) -> SessionResult<bool> {
        match self.manager() {
            Some(manager) => manager.update_token(min_validity).await,
            None => Err(SessionError::TokenRefresh),
        }
    }
}

#[async_trait]
impl StepUpLogin for ManagerHandle {
    async fn login_at_high_assurance(&self) -> SessionResult<()> {
        match self.manager() {
            Some(manager) => manager.login_at_high_assurance().await,
            None => Err(SessionError::Authentication),
        }
    }
}
