//! Error types for store providers.
//!
//! Variants are typed so callers can branch on the condition: a re-run can
//! treat [`Error::TableAlreadyExists`] as benign while a fresh run cannot.

use fstore_core::{MaterializationId, ProviderType, ResourceId};

/// The result type used throughout fstore-provider.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by online and offline stores.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A table for the name and variant already exists.
    #[error("table already exists: {name} ({variant})")]
    TableAlreadyExists {
        /// Resource name.
        name: String,
        /// Resource variant.
        variant: String,
    },

    /// No table exists for the name and variant.
    #[error("table not found: {name} ({variant})")]
    TableNotFound {
        /// Resource name.
        name: String,
        /// Resource variant.
        variant: String,
    },

    /// The entity has no value in the table.
    #[error("entity not found: {entity}")]
    EntityNotFound {
        /// Entity identifier.
        entity: String,
    },

    /// A value could not be coerced into the table's declared type.
    #[error("cannot coerce {found} into {expected}: {message}")]
    TypeCoercion {
        /// Declared type of the table.
        expected: String,
        /// Representation that was supplied.
        found: String,
        /// Why the conversion failed.
        message: String,
    },

    /// The provider does not implement a required capability.
    #[error("provider {provider} does not support {capability}")]
    UnsupportedCapability {
        /// Provider type tag.
        provider: ProviderType,
        /// Name of the missing capability.
        capability: &'static str,
    },

    /// No materialization exists with the ID.
    #[error("materialization not found: {id}")]
    MaterializationNotFound {
        /// Materialization ID.
        id: MaterializationId,
    },

    /// A materialization with the ID already exists.
    #[error("materialization already exists: {id}")]
    MaterializationAlreadyExists {
        /// Materialization ID.
        id: MaterializationId,
    },

    /// The offline store holds no source rows for the resource.
    #[error("dataset not found: {resource}")]
    DatasetNotFound {
        /// Resource whose dataset is missing.
        resource: ResourceId,
    },

    /// No factory is registered for the provider type.
    #[error("unknown provider type: {provider}")]
    UnknownProvider {
        /// Provider type tag.
        provider: ProviderType,
    },

    /// A backend config was missing, malformed, or inconsistent.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// A storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A serialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// An error from fstore-core that has no provider-level counterpart.
    #[error("core error: {0}")]
    Core(fstore_core::Error),
}

impl Error {
    /// Creates a new storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub(crate) fn table_exists(name: &str, variant: &str) -> Self {
        Self::TableAlreadyExists {
            name: name.to_string(),
            variant: variant.to_string(),
        }
    }

    pub(crate) fn table_not_found(name: &str, variant: &str) -> Self {
        Self::TableNotFound {
            name: name.to_string(),
            variant: variant.to_string(),
        }
    }

    pub(crate) fn entity_not_found(entity: &str) -> Self {
        Self::EntityNotFound {
            entity: entity.to_string(),
        }
    }
}

impl From<fstore_core::Error> for Error {
    fn from(err: fstore_core::Error) -> Self {
        match err {
            fstore_core::Error::TypeCoercion {
                expected,
                found,
                message,
            } => Self::TypeCoercion {
                expected,
                found,
                message,
            },
            fstore_core::Error::Configuration { message } => Self::Configuration { message },
            fstore_core::Error::Serialization { message } => Self::Serialization { message },
            other => Self::Core(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn every_variant_has_a_message() {
        let errors = vec![
            Error::table_exists("f", "v"),
            Error::table_not_found("f", "v"),
            Error::entity_not_found("e1"),
            Error::UnsupportedCapability {
                provider: ProviderType::LOCAL_ONLINE,
                capability: "vector store",
            },
            Error::DatasetNotFound {
                resource: ResourceId::feature("f", "v"),
            },
            Error::storage("disk full"),
        ];
        for err in errors {
            assert!(!err.to_string().is_empty());
        }
    }

    #[test]
    fn core_coercion_maps_to_typed_variant() {
        let core = fstore_core::Error::coercion(fstore_core::ScalarType::Int32, "bool", "nope");
        let err: Error = core.into();
        assert!(matches!(err, Error::TypeCoercion { .. }));
    }

    #[test]
    fn storage_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = Error::storage_with_source("write failed", io);
        assert!(err.source().is_some());
    }
}
