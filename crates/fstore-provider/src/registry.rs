//! Provider registry: type tag → factory.
//!
//! The registry turns a `(ProviderType, SerializedConfig)` pair into a live
//! store. It is the only place that knows concrete backend types, so new
//! backends plug in with [`ProviderRegistry::register`] without touching
//! callers.
//!
//! In-process backends are cached per `namespace`: two configs naming the
//! same namespace resolve to the same instance within one registry.
//!
//! # Example
//!
//! ```rust
//! use fstore_core::{ProviderConfig, ProviderType};
//! use fstore_provider::config::MemoryConfig;
//! use fstore_provider::registry::ProviderRegistry;
//!
//! let registry = ProviderRegistry::with_defaults();
//! let config = MemoryConfig::new("docs").serialize_config()?;
//! let store = registry
//!     .get(&ProviderType::LOCAL_ONLINE, &config)?
//!     .into_online_store()?;
//! assert_eq!(store.provider_type(), ProviderType::LOCAL_ONLINE);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use fstore_core::{ProviderConfig, ProviderType, SerializedConfig};

use crate::backends::{BlobOnlineStore, MemoryOfflineStore, MemoryOnlineStore, VectorMemoryStore};
use crate::blob::{BlobStorage, FileBlobStorage, MemoryBlobStorage};
use crate::config::{BlobBackendConfig, BlobConfig, MemoryConfig};
use crate::error::{Error, Result};
use crate::offline::OfflineStore;
use crate::online::OnlineStore;

fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("lock poisoned")
}

/// A store built from a config, tagged by role.
#[derive(Clone)]
pub enum Provider {
    /// A store serving feature values.
    Online(Arc<dyn OnlineStore>),
    /// A store holding computed datasets.
    Offline(Arc<dyn OfflineStore>),
}

impl Provider {
    /// Returns the provider type tag.
    #[must_use]
    pub fn provider_type(&self) -> ProviderType {
        match self {
            Self::Online(store) => store.provider_type(),
            Self::Offline(store) => store.provider_type(),
        }
    }

    /// Returns the online store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedCapability`] if this is an offline store.
    pub fn into_online_store(self) -> Result<Arc<dyn OnlineStore>> {
        match self {
            Self::Online(store) => Ok(store),
            Self::Offline(store) => Err(Error::UnsupportedCapability {
                provider: store.provider_type(),
                capability: "online store",
            }),
        }
    }

    /// Returns the offline store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedCapability`] if this is an online store.
    pub fn into_offline_store(self) -> Result<Arc<dyn OfflineStore>> {
        match self {
            Self::Offline(store) => Ok(store),
            Self::Online(store) => Err(Error::UnsupportedCapability {
                provider: store.provider_type(),
                capability: "offline store",
            }),
        }
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Online(store) => write!(f, "Online({})", store.provider_type()),
            Self::Offline(store) => write!(f, "Offline({})", store.provider_type()),
        }
    }
}

/// Builds a provider from a serialized config.
pub trait ProviderFactory: Send + Sync {
    /// Builds the provider.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the config does not decode.
    fn build(&self, config: &SerializedConfig) -> Result<Provider>;
}

impl<F> ProviderFactory for F
where
    F: Fn(&SerializedConfig) -> Result<Provider> + Send + Sync,
{
    fn build(&self, config: &SerializedConfig) -> Result<Provider> {
        self(config)
    }
}

/// Instances shared by namespace.
struct Shared<T> {
    instances: Mutex<HashMap<String, Arc<T>>>,
}

impl<T> Default for Shared<T> {
    fn default() -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> Shared<T> {
    fn get_or_init(&self, namespace: &str, init: impl FnOnce() -> T) -> Result<Arc<T>> {
        let mut instances = self.instances.lock().map_err(poison_err)?;
        Ok(Arc::clone(
            instances
                .entry(namespace.to_string())
                .or_insert_with(|| Arc::new(init())),
        ))
    }
}

/// Registry of provider factories keyed by type tag.
pub struct ProviderRegistry {
    factories: RwLock<HashMap<ProviderType, Arc<dyn ProviderFactory>>>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("provider_types", &self.provider_types().unwrap_or_default())
            .finish()
    }
}

impl ProviderRegistry {
    /// Creates a registry with no factories.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a registry with the built-in backends registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut factories: HashMap<ProviderType, Arc<dyn ProviderFactory>> = HashMap::new();

        let local = Arc::new(Shared::<MemoryOnlineStore>::default());
        factories.insert(
            ProviderType::LOCAL_ONLINE,
            Arc::new(move |config: &SerializedConfig| -> Result<Provider> {
                let config = MemoryConfig::deserialize_config(config)?;
                let namespace = config.namespace.clone();
                let store = local.get_or_init(&namespace, || MemoryOnlineStore::new(config))?;
                Ok(Provider::Online(store))
            }),
        );

        let vector = Arc::new(Shared::<VectorMemoryStore>::default());
        factories.insert(
            ProviderType::VECTOR_MEMORY_ONLINE,
            Arc::new(move |config: &SerializedConfig| -> Result<Provider> {
                let config = MemoryConfig::deserialize_config(config)?;
                let namespace = config.namespace.clone();
                let store = vector.get_or_init(&namespace, || VectorMemoryStore::new(config))?;
                Ok(Provider::Online(store))
            }),
        );

        let buckets = Arc::new(Shared::<MemoryBlobStorage>::default());
        factories.insert(
            ProviderType::BLOB_ONLINE,
            Arc::new(move |config: &SerializedConfig| -> Result<Provider> {
                let config = BlobConfig::deserialize_config(config)?;
                let storage: Arc<dyn BlobStorage> = match &config.backend {
                    BlobBackendConfig::Memory { namespace } => {
                        buckets.get_or_init(namespace, MemoryBlobStorage::new)?
                    }
                    BlobBackendConfig::LocalFs { root } => {
                        if root.as_os_str().is_empty() {
                            return Err(Error::configuration("blob root directory is empty"));
                        }
                        Arc::new(FileBlobStorage::new(root.clone()))
                    }
                };
                Ok(Provider::Online(Arc::new(BlobOnlineStore::new(config, storage))))
            }),
        );

        let offline = Arc::new(Shared::<MemoryOfflineStore>::default());
        factories.insert(
            ProviderType::MEMORY_OFFLINE,
            Arc::new(move |config: &SerializedConfig| -> Result<Provider> {
                let config = MemoryConfig::deserialize_config(config)?;
                let namespace = config.namespace.clone();
                let store = offline.get_or_init(&namespace, || MemoryOfflineStore::new(config))?;
                Ok(Provider::Offline(store))
            }),
        );

        Self {
            factories: RwLock::new(factories),
        }
    }

    /// Registers a factory, replacing any existing one for the type.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the registry lock is poisoned.
    pub fn register(
        &self,
        provider_type: ProviderType,
        factory: impl ProviderFactory + 'static,
    ) -> Result<()> {
        self.factories
            .write()
            .map_err(poison_err)?
            .insert(provider_type, Arc::new(factory));
        Ok(())
    }

    /// Returns the registered provider types, sorted.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the registry lock is poisoned.
    pub fn provider_types(&self) -> Result<Vec<ProviderType>> {
        let mut types: Vec<ProviderType> =
            self.factories.read().map_err(poison_err)?.keys().cloned().collect();
        types.sort();
        Ok(types)
    }

    /// Builds a provider from its type tag and serialized config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownProvider`] if no factory is registered for
    /// the type, or the factory's error if the config does not decode.
    pub fn get(&self, provider_type: &ProviderType, config: &SerializedConfig) -> Result<Provider> {
        let factory = self
            .factories
            .read()
            .map_err(poison_err)?
            .get(provider_type)
            .cloned()
            .ok_or_else(|| Error::UnknownProvider {
                provider: provider_type.clone(),
            })?;
        factory.build(config)
    }

    /// Builds a provider and requires it to be an online store.
    ///
    /// # Errors
    ///
    /// See [`ProviderRegistry::get`] and [`Provider::into_online_store`].
    pub fn online_store(
        &self,
        provider_type: &ProviderType,
        config: &SerializedConfig,
    ) -> Result<Arc<dyn OnlineStore>> {
        self.get(provider_type, config)?.into_online_store()
    }

    /// Builds a provider and requires it to be an offline store.
    ///
    /// # Errors
    ///
    /// See [`ProviderRegistry::get`] and [`Provider::into_offline_store`].
    pub fn offline_store(
        &self,
        provider_type: &ProviderType,
        config: &SerializedConfig,
    ) -> Result<Arc<dyn OfflineStore>> {
        self.get(provider_type, config)?.into_offline_store()
    }
}
