//! Connection configs for the built-in backends.

use std::path::PathBuf;

use fstore_core::ProviderConfig;
use serde::{Deserialize, Serialize};

/// Config for in-process backends.
///
/// Stores built from configs with the same `namespace` by one
/// [`ProviderRegistry`](crate::ProviderRegistry) share state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Name of the shared in-process instance.
    #[serde(default)]
    pub namespace: String,
}

impl MemoryConfig {
    /// Creates a config for the given namespace.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

impl ProviderConfig for MemoryConfig {}

/// Where a blob-backed store keeps its objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlobBackendConfig {
    /// In-process object map shared by namespace.
    Memory {
        /// Name of the shared in-process instance.
        namespace: String,
    },
    /// Directory on the local filesystem.
    LocalFs {
        /// Root directory; created on first use.
        root: PathBuf,
    },
}

/// Config for the blob-backed online store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobConfig {
    /// Object storage backend.
    pub backend: BlobBackendConfig,
    /// Key prefix under which tables are written.
    #[serde(default)]
    pub prefix: String,
}

impl BlobConfig {
    /// Creates a config backed by an in-process object map.
    #[must_use]
    pub fn memory(namespace: impl Into<String>) -> Self {
        Self {
            backend: BlobBackendConfig::Memory {
                namespace: namespace.into(),
            },
            prefix: String::new(),
        }
    }

    /// Creates a config backed by a local directory.
    #[must_use]
    pub fn local_fs(root: impl Into<PathBuf>) -> Self {
        Self {
            backend: BlobBackendConfig::LocalFs { root: root.into() },
            prefix: String::new(),
        }
    }

    /// Sets the key prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

impl ProviderConfig for BlobConfig {}
