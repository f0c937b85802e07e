//! Failure injection for online stores.
//!
//! [`FailingOnlineStore`] behaves like the in-process map store except that
//! writes to the entities listed in its config fail with a storage error.
//! Because it is built from a serialized [`FailingConfig`], chunk workers
//! rebuilt through the registry inherit the same failures.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use fstore_core::{ProviderConfig, ProviderType, SerializedConfig, Value, ValueType};
use fstore_provider::backends::MemoryOnlineStore;
use fstore_provider::config::MemoryConfig;
use fstore_provider::{Error, OnlineStore, OnlineTable, Provider, ProviderFactory, Result};

/// Type tag of the failure-injecting online store.
pub const FAILING_ONLINE: ProviderType = ProviderType::from_static("FAILING_ONLINE");

/// Config for [`FailingOnlineStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailingConfig {
    /// Namespace of the wrapped in-process store.
    pub namespace: String,
    /// Entities whose writes fail.
    #[serde(default)]
    pub fail_entities: BTreeSet<String>,
}

impl FailingConfig {
    /// Creates a config that fails writes to `entities`.
    pub fn new<I, S>(namespace: impl Into<String>, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            namespace: namespace.into(),
            fail_entities: entities.into_iter().map(Into::into).collect(),
        }
    }
}

impl ProviderConfig for FailingConfig {}

/// Online store that fails writes to selected entities.
pub struct FailingOnlineStore {
    config: FailingConfig,
    inner: Arc<MemoryOnlineStore>,
}

impl FailingOnlineStore {
    /// Wraps `inner`.
    pub fn new(config: FailingConfig, inner: Arc<MemoryOnlineStore>) -> Self {
        Self { config, inner }
    }

    fn wrap(&self, table: Arc<dyn OnlineTable>) -> Arc<dyn OnlineTable> {
        Arc::new(FailingTable {
            inner: table,
            fail_entities: self.config.fail_entities.clone(),
        })
    }
}

#[async_trait]
impl OnlineStore for FailingOnlineStore {
    fn provider_type(&self) -> ProviderType {
        FAILING_ONLINE
    }

    fn config(&self) -> Result<SerializedConfig> {
        Ok(self.config.serialize_config()?)
    }

    async fn create_table(
        &self,
        name: &str,
        variant: &str,
        value_type: &ValueType,
    ) -> Result<Arc<dyn OnlineTable>> {
        let table = self.inner.create_table(name, variant, value_type).await?;
        Ok(self.wrap(table))
    }

    async fn get_table(&self, name: &str, variant: &str) -> Result<Arc<dyn OnlineTable>> {
        let table = self.inner.get_table(name, variant).await?;
        Ok(self.wrap(table))
    }

    async fn delete_table(&self, name: &str, variant: &str) -> Result<()> {
        self.inner.delete_table(name, variant).await
    }
}

struct FailingTable {
    inner: Arc<dyn OnlineTable>,
    fail_entities: BTreeSet<String>,
}

#[async_trait]
impl OnlineTable for FailingTable {
    fn value_type(&self) -> ValueType {
        self.inner.value_type()
    }

    async fn set(&self, entity: &str, value: Value) -> Result<()> {
        if self.fail_entities.contains(entity) {
            return Err(Error::storage(format!(
                "injected write failure for entity {entity}"
            )));
        }
        self.inner.set(entity, value).await
    }

    async fn get(&self, entity: &str) -> Result<Value> {
        self.inner.get(entity).await
    }
}

/// Returns a factory for [`FAILING_ONLINE`] stores.
///
/// Configs naming the same namespace share the wrapped store.
pub fn failing_factory() -> impl ProviderFactory {
    let stores: Mutex<HashMap<String, Arc<MemoryOnlineStore>>> = Mutex::new(HashMap::new());
    move |config: &SerializedConfig| -> Result<Provider> {
        let config = FailingConfig::deserialize_config(config)?;
        let inner = {
            let mut stores = stores
                .lock()
                .map_err(|_| Error::storage("lock poisoned"))?;
            Arc::clone(stores.entry(config.namespace.clone()).or_insert_with(|| {
                Arc::new(MemoryOnlineStore::new(MemoryConfig::new(
                    config.namespace.clone(),
                )))
            }))
        };
        Ok(Provider::Online(Arc::new(FailingOnlineStore::new(
            config, inner,
        ))))
    }
}
