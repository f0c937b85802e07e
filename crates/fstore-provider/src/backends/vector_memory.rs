//! In-process vector search online store.
//!
//! Nearest-neighbour queries are answered by brute force over squared L2
//! distance. Ties are broken by entity ID so results are deterministic.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use fstore_core::{ProviderConfig, ProviderType, SerializedConfig, Value, ValueType, VectorType};

use crate::config::MemoryConfig;
use crate::error::{Error, Result};
use crate::online::{OnlineStore, OnlineTable, VectorStore, VectorStoreTable};

fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("lock poisoned")
}

type TableKey = (String, String);

fn table_key(name: &str, variant: &str) -> TableKey {
    (name.to_string(), variant.to_string())
}

#[derive(Default)]
struct State {
    indexes: HashMap<TableKey, VectorType>,
    tables: HashMap<TableKey, Arc<VectorMemoryTable>>,
}

/// Online store with similarity search held in process memory.
///
/// Embedding tables require [`VectorStore::create_index`] to run before
/// [`OnlineStore::create_table`].
#[derive(Default)]
pub struct VectorMemoryStore {
    config: MemoryConfig,
    state: RwLock<State>,
}

impl std::fmt::Debug for VectorMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorMemoryStore")
            .field("namespace", &self.config.namespace)
            .finish_non_exhaustive()
    }
}

impl VectorMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            state: RwLock::new(State::default()),
        }
    }
}

#[async_trait]
impl OnlineStore for VectorMemoryStore {
    fn provider_type(&self) -> ProviderType {
        ProviderType::VECTOR_MEMORY_ONLINE
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
        let mut state = self.state.write().map_err(poison_err)?;
        let key = table_key(name, variant);
        if state.tables.contains_key(&key) {
            return Err(Error::table_exists(name, variant));
        }
        if let ValueType::Vector(vector) = value_type {
            match state.indexes.get(&key) {
                Some(index) if index.dimension == vector.dimension => {}
                Some(index) => {
                    return Err(Error::configuration(format!(
                        "index for {name} ({variant}) has dimension {}, table declares {}",
                        index.dimension, vector.dimension
                    )));
                }
                None if vector.is_embedding => {
                    return Err(Error::configuration(format!(
                        "index for {name} ({variant}) must be created before the table"
                    )));
                }
                None => {}
            }
        }
        let table = Arc::new(VectorMemoryTable::new(*value_type));
        state.tables.insert(key, Arc::clone(&table));
        Ok(table)
    }

    async fn get_table(&self, name: &str, variant: &str) -> Result<Arc<dyn OnlineTable>> {
        let state = self.state.read().map_err(poison_err)?;
        state
            .tables
            .get(&table_key(name, variant))
            .map(|table| Arc::clone(table) as Arc<dyn OnlineTable>)
            .ok_or_else(|| Error::table_not_found(name, variant))
    }

    async fn delete_table(&self, name: &str, variant: &str) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        let key = table_key(name, variant);
        state.indexes.remove(&key);
        state
            .tables
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| Error::table_not_found(name, variant))
    }

    fn as_vector_store(&self) -> Option<&dyn VectorStore> {
        Some(self)
    }
}

#[async_trait]
impl VectorStore for VectorMemoryStore {
    async fn create_index(
        &self,
        name: &str,
        variant: &str,
        vector_type: &VectorType,
    ) -> Result<()> {
        if vector_type.dimension == 0 {
            return Err(Error::configuration("index dimension must be positive"));
        }
        let mut state = self.state.write().map_err(poison_err)?;
        match state.indexes.get(&table_key(name, variant)) {
            Some(existing) if existing.dimension == vector_type.dimension => Ok(()),
            Some(existing) => Err(Error::configuration(format!(
                "index for {name} ({variant}) already exists with dimension {}",
                existing.dimension
            ))),
            None => {
                state
                    .indexes
                    .insert(table_key(name, variant), *vector_type);
                tracing::debug!(name, variant, dimension = vector_type.dimension, "created index");
                Ok(())
            }
        }
    }

    async fn get_vector_table(
        &self,
        name: &str,
        variant: &str,
    ) -> Result<Arc<dyn VectorStoreTable>> {
        let state = self.state.read().map_err(poison_err)?;
        let table = state
            .tables
            .get(&table_key(name, variant))
            .ok_or_else(|| Error::table_not_found(name, variant))?;
        if table.value_type.as_vector().is_none() {
            return Err(Error::configuration(format!(
                "table {name} ({variant}) does not hold vectors"
            )));
        }
        Ok(Arc::clone(table) as Arc<dyn VectorStoreTable>)
    }
}

/// Table with brute-force nearest-neighbour search.
#[derive(Debug)]
pub struct VectorMemoryTable {
    value_type: ValueType,
    values: RwLock<BTreeMap<String, Value>>,
}

impl VectorMemoryTable {
    fn new(value_type: ValueType) -> Self {
        Self {
            value_type,
            values: RwLock::new(BTreeMap::new()),
        }
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[async_trait]
impl OnlineTable for VectorMemoryTable {
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

    fn as_vector_table(&self) -> Option<&dyn VectorStoreTable> {
        self.value_type.as_vector().map(|_| self as &dyn VectorStoreTable)
    }
}

#[async_trait]
impl VectorStoreTable for VectorMemoryTable {
    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<String>> {
        let Some(vector) = self.value_type.as_vector() else {
            return Err(Error::configuration("table does not hold vectors"));
        };
        if query.len() != vector.dimension as usize {
            return Err(Error::TypeCoercion {
                expected: vector.to_string(),
                found: format!("vector<{}>", query.len()),
                message: "query dimension does not match the index".into(),
            });
        }

        let values = self.values.read().map_err(poison_err)?;
        let mut scored: Vec<(f32, &String)> = values
            .iter()
            .filter_map(|(entity, value)| {
                value
                    .as_vector()
                    .map(|elements| (squared_l2(elements, query), entity))
            })
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)));
        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, entity)| entity.clone())
            .collect())
    }
}
