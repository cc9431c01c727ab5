//! Error handling for the session manager core.
//!
//! Error messages are informative for debugging but never carry token
//! material or identity claims.

use thiserror::Error;

/// Result type alias using the core error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required configuration value is missing.
    #[error("missing configuration value: {0}")]
    MissingValue(&'static str),

    /// Configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns whether a required value was absent, as opposed to malformed.
    #[must_use]
    pub const fn is_missing_value(&self) -> bool {
        matches!(self, Self::MissingValue(_))
    }
}
