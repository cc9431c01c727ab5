//! # kc-session
//!
//! Client-side session management around a Keycloak identity provider.
//!
//! The [`SessionManager`] restores a session from persisted tokens, reacts
//! to provider notifications through an explicit state machine, validates
//! identity claims and publishes the user-visible state into a
//! [`SessionContext`] that the UI layer reads.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use kc_core::SessionConfig;
//! use kc_session::{FileStore, SessionContext, SessionManager};
//!
//! let context = Arc::new(SessionContext::new());
//! let manager = SessionManager::builder(SessionConfig::from_env()?, provider)
//!     .session_store(Arc::new(FileStore::open("session.json")?))
//!     .context(Arc::clone(&context))
//!     .build()?;
//!
//! if !manager.initialize().await? {
//!     manager.login("https://portal.example.com/").await?;
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(warnings)]

pub mod claims;
pub mod context;
pub mod error;
pub mod manager;
pub mod provider;
pub mod state;
pub mod storage;
pub mod token;

pub use claims::{assurance_level_from_acr, capitalize_names, IdentityClaims, UserProfile};
pub use context::{
    Representation, RepresentationsLoader, SessionContext, SessionSnapshot, SessionView,
    StepUpLogin, TokenRefresher,
};
pub use error::{ProviderError, ProviderResult, SessionError, SessionResult};
pub use manager::{SessionManager, SessionManagerBuilder, DEFAULT_MIN_VALIDITY};
pub use provider::{
    IdentityProviderClient, InitOptions, LoginOptions, LogoutOptions, OnLoad, ProviderEvent,
};
pub use state::{SessionState, Transition};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use token::PersistedTokenSet;
