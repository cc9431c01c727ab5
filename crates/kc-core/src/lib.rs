//! # kc-core
//!
//! Core configuration, error handling and lifecycle events for the
//! Keycloak client session manager.
//!
//! This crate provides the foundational types shared by `kc-session` and by
//! the application that embeds it.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(warnings)]

pub mod config;
pub mod error;
pub mod event;

pub use config::{ProviderUrls, SessionConfig};
pub use error::{Error, Result};
pub use event::{Event, EventBuilder, EventOutcome, EventType};
