//! In-process map online store.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: No durability
//! - **Single-process only**: Sharing happens through the registry namespace

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use fstore_core::{ProviderConfig, ProviderType, SerializedConfig, Value, ValueType};

use crate::config::MemoryConfig;
use crate::error::{Error, Result};
use crate::online::{OnlineStore, OnlineTable};

fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("lock poisoned")
}

type TableKey = (String, String);

fn table_key(name: &str, variant: &str) -> TableKey {
    (name.to_string(), variant.to_string())
}

/// Online store holding tables in process memory.
#[derive(Default)]
pub struct MemoryOnlineStore {
    config: MemoryConfig,
    tables: RwLock<HashMap<TableKey, Arc<MemoryTable>>>,
}

impl std::fmt::Debug for MemoryOnlineStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryOnlineStore")
            .field("namespace", &self.config.namespace)
            .finish_non_exhaustive()
    }
}

impl MemoryOnlineStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            tables: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl OnlineStore for MemoryOnlineStore {
    fn provider_type(&self) -> ProviderType {
        ProviderType::LOCAL_ONLINE
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
        let mut tables = self.tables.write().map_err(poison_err)?;
        let key = table_key(name, variant);
        if tables.contains_key(&key) {
            return Err(Error::table_exists(name, variant));
        }
        let table = Arc::new(MemoryTable::new(*value_type));
        tables.insert(key, Arc::clone(&table));
        Ok(table)
    }

    async fn get_table(&self, name: &str, variant: &str) -> Result<Arc<dyn OnlineTable>> {
        let tables = self.tables.read().map_err(poison_err)?;
        tables
            .get(&table_key(name, variant))
            .map(|table| Arc::clone(table) as Arc<dyn OnlineTable>)
            .ok_or_else(|| Error::table_not_found(name, variant))
    }

    async fn delete_table(&self, name: &str, variant: &str) -> Result<()> {
        let mut tables = self.tables.write().map_err(poison_err)?;
        tables
            .remove(&table_key(name, variant))
            .map(|_| ())
            .ok_or_else(|| Error::table_not_found(name, variant))
    }
}

/// Table held in process memory.
#[derive(Debug)]
pub struct MemoryTable {
    value_type: ValueType,
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryTable {
    fn new(value_type: ValueType) -> Self {
        Self {
            value_type,
            values: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl OnlineTable for MemoryTable {
    fn value_type(&self) -> ValueType {
        self.value_type
    }

    async fn set(&self, entity: &str, value: Value) -> Result<()> {
        let value = value.coerce(&self.value_type)?;
        self.values
            .write()
            .map_err(poison_err)?
            .insert(entity.to_string(), value);
        Ok(())
    }

    async fn get(&self, entity: &str) -> Result<Value> {
        self.values
            .read()
            .map_err(poison_err)?
            .get(entity)
            .cloned()
            .ok_or_else(|| Error::entity_not_found(entity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fstore_core::ScalarType;

    #[tokio::test]
    async fn create_get_delete_table() -> Result<()> {
        let store = MemoryOnlineStore::new(MemoryConfig::new("t"));
        let ty = ValueType::Scalar(ScalarType::Int64);
        store.create_table("f", "v", &ty).await?;
        let table = store.get_table("f", "v").await?;
        assert_eq!(table.value_type(), ty);

        assert!(matches!(
            store.create_table("f", "v", &ty).await,
            Err(Error::TableAlreadyExists { .. })
        ));

        store.delete_table("f", "v").await?;
        assert!(matches!(
            store.get_table("f", "v").await,
            Err(Error::TableNotFound { .. })
        ));
        assert!(matches!(
            store.delete_table("f", "v").await,
            Err(Error::TableNotFound { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn set_coerces_to_declared_type() -> Result<()> {
        let store = MemoryOnlineStore::new(MemoryConfig::default());
        let table = store
            .create_table("f", "v", &ValueType::Scalar(ScalarType::Int64))
            .await?;
        table.set("a", Value::Int(1)).await?;
        assert_eq!(table.get("a").await?, Value::Int64(1));

        let err = table.set("b", Value::Bool(true)).await.unwrap_err();
        assert!(matches!(err, Error::TypeCoercion { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn has_no_vector_capability() {
        let store = MemoryOnlineStore::new(MemoryConfig::default());
        assert!(store.as_vector_store().is_none());
    }
}
