//! Error types for check-in collaborators.
//!
//! Checking a ticket never fails. These errors come from the things around
//! the validator: the ticket list, the used-ticket store and configuration.

use thiserror::Error;
use turnstile_core::key_value::KeyValueError;

/// Failure to load the list of valid codes
#[derive(Error, Debug)]
pub enum SourceError {
    /// The source could not be read
    #[error("Failed to read ticket source {path}: {source}")]
    Io {
        /// Path that was read
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The source was read but is not a ticket list
    #[error("Malformed ticket source: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Failure to load or save the used set
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// The key-value store failed
    #[error(transparent)]
    Store(#[from] KeyValueError),

    /// The stored value is not a JSON list of codes
    #[error("Malformed used-ticket list: {0}")]
    Malformed(String),
}

impl PersistenceError {
    /// Whether retrying the same operation could succeed
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Store(KeyValueError::Io(_) | KeyValueError::Unavailable(_))
        )
    }
}

/// Invalid configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable holds a value that cannot be used
    #[error("Invalid value for {var}: {value:?} ({reason})")]
    InvalidValue {
        /// Environment variable name
        var: &'static str,
        /// Value found
        value: String,
        /// What was expected
        reason: String,
    },
}
