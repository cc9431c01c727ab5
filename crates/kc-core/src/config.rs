//! Session manager configuration.
//!
//! Configuration is loaded from environment variables (with `.env` support)
//! or from a TOML file, with defaults for everything but the identity
//! provider coordinates.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default seconds of remaining validity below which a token is refreshed.
pub const DEFAULT_MIN_TOKEN_VALIDITY: u32 = 10;

/// Default authentication context reference requested on step-up login.
pub const DEFAULT_HIGH_ASSURANCE_ACR: &str = "Level4";

/// Configuration for a session manager instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Base URL of the identity provider.
    pub url: String,
    /// Realm the client is registered in.
    pub realm: String,
    /// Public client ID of the application.
    pub client_id: String,
    /// External service origins published to the UI after login.
    #[serde(default)]
    pub provider_urls: ProviderUrls,
    /// Minimum remaining token validity in seconds before a refresh.
    #[serde(default = "default_min_token_validity")]
    pub min_token_validity: u32,
    /// ACR value requested by step-up (high assurance) login.
    #[serde(default = "default_high_assurance_acr")]
    pub high_assurance_acr: String,
}

/// Origins of the external services the UI links to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderUrls {
    /// Altinn origin.
    pub altinn_url: Option<String>,
    /// Property tax (eiendomsskatt) service origin.
    pub eiendomsskatt_url: Option<String>,
}

fn default_min_token_validity() -> u32 {
    DEFAULT_MIN_TOKEN_VALIDITY
}

fn default_high_assurance_acr() -> String {
    DEFAULT_HIGH_ASSURANCE_ACR.to_string()
}

impl SessionConfig {
    /// Creates a configuration for the given provider coordinates.
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        realm: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            realm: realm.into(),
            client_id: client_id.into(),
            provider_urls: ProviderUrls::default(),
            min_token_validity: DEFAULT_MIN_TOKEN_VALIDITY,
            high_assurance_acr: default_high_assurance_acr(),
        }
    }

    /// Sets the external service origins.
    #[must_use]
    pub fn with_provider_urls(mut self, urls: ProviderUrls) -> Self {
        self.provider_urls = urls;
        self
    }

    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from a key lookup function.
    ///
    /// Recognized keys are `KC_URL`, `KC_REALM`, `KC_CLIENT_ID`,
    /// `KC_ALTINN_URL`, `KC_EIENDOMSSKATT_URL`, `KC_MIN_TOKEN_VALIDITY`
    /// and `KC_HIGH_ASSURANCE_ACR`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("KC_URL").ok_or(Error::MissingValue("KC_URL"))?;
        let realm = lookup("KC_REALM").ok_or(Error::MissingValue("KC_REALM"))?;
        let client_id = lookup("KC_CLIENT_ID").ok_or(Error::MissingValue("KC_CLIENT_ID"))?;

        let min_token_validity = match lookup("KC_MIN_TOKEN_VALIDITY") {
            Some(raw) => raw.parse().map_err(|_| {
                Error::Config(format!("KC_MIN_TOKEN_VALIDITY is not a number: {raw}"))
            })?,
            None => DEFAULT_MIN_TOKEN_VALIDITY,
        };

        let config = Self {
            url,
            realm,
            client_id,
            provider_urls: ProviderUrls {
                altinn_url: lookup("KC_ALTINN_URL"),
                eiendomsskatt_url: lookup("KC_EIENDOMSSKATT_URL"),
            },
            min_token_validity,
            high_assurance_acr: lookup("KC_HIGH_ASSURANCE_ACR")
                .unwrap_or_else(default_high_assurance_acr),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Checks that the provider coordinates are usable.
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::MissingValue("url"));
        }
        url::Url::parse(&self.url)
            .map_err(|e| Error::Config(format!("invalid provider url '{}': {e}", self.url)))?;
        if self.realm.trim().is_empty() {
            return Err(Error::MissingValue("realm"));
        }
        if self.client_id.trim().is_empty() {
            return Err(Error::MissingValue("client_id"));
        }
        if self.high_assurance_acr.is_empty() {
            return Err(Error::MissingValue("high_assurance_acr"));
        }
        Ok(())
    }
}
