//! Error types for materialization runners.

use std::sync::Arc;

/// The result type used throughout fstore-runner.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while materializing a resource.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The online table already exists on a run that is not an update.
    ///
    /// A fresh resource should never collide with an existing table, so
    /// this is a consistency violation rather than a benign re-run.
    #[error("table {name} ({variant}) already exists despite being a new job")]
    TableExistsOnNewRun {
        /// Resource name.
        name: String,
        /// Resource variant.
        variant: String,
    },

    /// Chunks could not be handed to the execution backend.
    #[error("dispatch error: {message}")]
    Dispatch {
        /// Description of the dispatch failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No runner is registered under the kind.
    #[error("unknown runner kind: {kind}")]
    UnknownRunner {
        /// The requested runner kind.
        kind: String,
    },

    /// A chunk index addresses rows past the end of the materialization.
    #[error("chunk {index} of size {chunk_size} starts past the last of {num_rows} rows")]
    InvalidChunk {
        /// Chunk index.
        index: u64,
        /// Rows per chunk.
        chunk_size: u64,
        /// Rows in the materialization.
        num_rows: u64,
    },

    /// A worker task panicked or was aborted before reporting a result.
    #[error("worker panicked: {message}")]
    WorkerPanicked {
        /// Description of the panic.
        message: String,
    },

    /// A synchronizing watcher was ended more than once.
    #[error("watcher already ended")]
    WatcherAlreadyEnded,

    /// A terminal watcher error wrapped with context.
    #[error("{context}: {source}")]
    Watch {
        /// Where the error was observed.
        context: String,
        /// The terminal error.
        #[source]
        source: Arc<Error>,
    },

    /// A configuration was missing or invalid.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// A serialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// Internal state could not be accessed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
    },

    /// An error from a store provider.
    #[error("provider error: {0}")]
    Provider(#[from] fstore_provider::Error),

    /// An error from fstore-core.
    #[error("core error: {0}")]
    Core(#[from] fstore_core::Error),
}

impl Error {
    /// Creates a new dispatch error.
    #[must_use]
    pub fn dispatch(message: impl Into<String>) -> Self {
        Self::Dispatch {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new dispatch error with a source.
    #[must_use]
    pub fn dispatch_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Dispatch {
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

    /// Creates a new storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Wraps a terminal watcher error with context.
    #[must_use]
    pub fn watch(context: impl Into<String>, source: Arc<Self>) -> Self {
        Self::Watch {
            context: context.into(),
            source,
        }
    }

    /// Returns the provider error at the root of this error, if any.
    #[must_use]
    pub fn provider_error(&self) -> Option<&fstore_provider::Error> {
        match self {
            Self::Provider(err) => Some(err),
            Self::Watch { source, .. } => source.provider_error(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn watch_error_keeps_context_and_source() {
        let inner = Arc::new(Error::Provider(fstore_provider::Error::EntityNotFound {
            entity: "e1".into(),
        }));
        let err = Error::watch("cloud watch", Arc::clone(&inner));
        assert!(err.to_string().starts_with("cloud watch: "));
        assert!(err.source().is_some());
        assert!(matches!(
            err.provider_error(),
            Some(fstore_provider::Error::EntityNotFound { .. })
        ));
    }

    #[test]
    fn table_exists_message_is_distinct() {
        let err = Error::TableExistsOnNewRun {
            name: "avg_txn".into(),
            variant: "v1".into(),
        };
        assert!(err.to_string().contains("new job"));
    }
}
