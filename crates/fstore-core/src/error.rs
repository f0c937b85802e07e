//! Error types and result aliases for fstore.
//!
//! This module defines the shared error types used by the core primitives.
//! Errors are structured for programmatic handling and include context for debugging.

use crate::value::ScalarType;

/// The result type used throughout fstore-core.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in core fstore operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An invalid identifier was provided.
    #[error("invalid identifier: {message}")]
    InvalidId {
        /// Description of what made the ID invalid.
        message: String,
    },

    /// A value could not be coerced into the declared type of a table.
    #[error("cannot coerce {found} into {expected}: {message}")]
    TypeCoercion {
        /// The declared type of the destination.
        expected: String,
        /// The representation that was supplied.
        found: String,
        /// Why the conversion failed.
        message: String,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// A configuration payload was missing, malformed, or of an unsupported version.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Creates a new serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a coercion error for a scalar destination.
    #[must_use]
    pub fn coercion(
        expected: ScalarType,
        found: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::TypeCoercion {
            expected: expected.to_string(),
            found: found.into(),
            message: message.into(),
        }
    }
}
