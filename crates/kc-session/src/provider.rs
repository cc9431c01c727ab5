//! Identity provider client capability interface.
//!
//! The OIDC protocol itself (redirect login, token issuance, refresh
//! handshake) lives behind this trait. The session manager only sequences
//! calls into it and reacts to what it reports.

use async_trait::async_trait;
use url::Url;

use crate::claims::IdentityClaims;
use crate::error::ProviderResult;
use crate::token::PersistedTokenSet;

/// What the provider does on load.
///
/// The manager only ever asks for a silent check; login is always an
/// explicit call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnLoad {
    /// Silently check for an existing session, never redirect.
    #[default]
    CheckSso,
}

/// Options for [`IdentityProviderClient::init`].
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Load behavior.
    pub on_load: OnLoad,
    /// Tokens restored from a previous page load.
    pub tokens: PersistedTokenSet,
}

/// Options for [`IdentityProviderClient::login`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginOptions {
    /// Where the provider sends the browser after login.
    pub redirect_uri: Option<String>,
}

/// Options for [`IdentityProviderClient::logout`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogoutOptions {
    /// Where the provider sends the browser after logout.
    pub redirect_uri: Option<String>,
}

/// Notification raised by the provider client outside of a direct call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The user was authenticated.
    AuthSuccess,
    /// Authentication failed.
    AuthError,
    /// Tokens were refreshed.
    AuthRefreshSuccess,
    /// A token refresh failed.
    AuthRefreshError,
}

/// Client for a redirect-based identity provider.
///
/// `login` and `logout` navigate away from the application; returning from
/// them does not mean the user is back.
#[async_trait]
pub trait IdentityProviderClient: Send + Sync {
    /// Initializes the client, optionally with restored tokens.
    ///
    /// Returns whether an authenticated session was established.
    async fn init(&self, options: InitOptions) -> ProviderResult<bool>;

    /// Starts a redirect login.
    async fn login(&self, options: LoginOptions) -> ProviderResult<()>;

    /// Logs out at the provider and redirects.
    async fn logout(&self, options: LogoutOptions) -> ProviderResult<()>;

    /// Refreshes the token if it expires within `min_validity` seconds.
    ///
    /// Returns whether a refresh happened.
    async fn update_token(&self, min_validity: u32) -> ProviderResult<bool>;

    /// Drops the in-memory tokens.
    fn clear_token(&self);

    /// Builds the provider's login URL.
    fn create_login_url(&self, options: &LoginOptions) -> ProviderResult<Url>;

    /// Current tokens.
    fn tokens(&self) -> PersistedTokenSet;

    /// Parsed ID token claims, once authenticated.
    fn id_token_claims(&self) -> Option<IdentityClaims>;
}
