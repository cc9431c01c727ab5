//! Persisted token set.

use serde::{Deserialize, Serialize};

use crate::error::SessionResult;
use crate::storage::KeyValueStore;

/// Well-known storage keys.
pub mod keys {
    /// Access (bearer) token.
    pub const ACCESS_TOKEN: &str = "accessToken";
    /// Refresh token.
    pub const REFRESH_TOKEN: &str = "refreshToken";
    /// ID token.
    pub const ID_TOKEN: &str = "idToken";
}

/// The three provider tokens, as written to session storage.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedTokenSet {
    /// Access token.
    pub access_token: Option<String>,
    /// Refresh token.
    pub refresh_token: Option<String>,
    /// ID token.
    pub id_token: Option<String>,
}

// Token values stay out of logs.
impl std::fmt::Debug for PersistedTokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedTokenSet")
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "***"))
            .field("id_token", &self.id_token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl PersistedTokenSet {
    /// Creates a token set from all three tokens.
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        id_token: impl Into<String>,
    ) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
            id_token: Some(id_token.into()),
        }
    }

    /// Returns whether no token is present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.id_token.is_none()
    }

    /// Reads the token set from `store`.
    pub fn load(store: &dyn KeyValueStore) -> SessionResult<Self> {
        Ok(Self {
            access_token: store.get(keys::ACCESS_TOKEN)?,
            refresh_token: store.get(keys::REFRESH_TOKEN)?,
            id_token: store.get(keys::ID_TOKEN)?,
        })
    }

    /// Writes the token set to `store`.
    ///
    /// Absent tokens are removed so no stale value outlives a refresh.
    pub fn persist(&self, store: &dyn KeyValueStore) -> SessionResult<()> {
        write_or_remove(store, keys::ACCESS_TOKEN, self.access_token.as_deref())?;
        write_or_remove(store, keys::REFRESH_TOKEN, self.refresh_token.as_deref())?;
        write_or_remove(store, keys::ID_TOKEN, self.id_token.as_deref())
    }

    /// Removes all three tokens from `store`.
    pub fn clear(store: &dyn KeyValueStore) -> SessionResult<()> {
        store.remove(keys::ACCESS_TOKEN)?;
        store.remove(keys::REFRESH_TOKEN)?;
        store.remove(keys::ID_TOKEN)
    }
}

fn write_or_remove(store: &dyn KeyValueStore, key: &str, value: Option<&str>) -> SessionResult<()> {
    match value {
        Some(v) => store.set(key, v),
        None => store.remove(key),
    }
}
