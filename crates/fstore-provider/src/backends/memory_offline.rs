//! In-process offline store.
//!
//! Holds raw source rows per resource and builds row-stable snapshots from
//! them. A snapshot keeps the latest value per entity (by timestamp, later
//! writes winning ties) and orders rows by entity ID, so the same row range
//! always addresses the same entities.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use futures::StreamExt;
use fstore_core::{
    MaterializationId, ProviderConfig, ProviderType, ResourceId, SerializedConfig,
};

use crate::config::MemoryConfig;
use crate::error::{Error, Result};
use crate::offline::{FeatureRow, Materialization, OfflineStore, RowStream};

fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("lock poisoned")
}

#[derive(Default)]
struct State {
    datasets: HashMap<ResourceId, Vec<FeatureRow>>,
    materializations: HashMap<MaterializationId, Arc<MemoryMaterialization>>,
}

/// Offline store holding datasets in process memory.
#[derive(Default)]
pub struct MemoryOfflineStore {
    config: MemoryConfig,
    state: RwLock<State>,
}

impl std::fmt::Debug for MemoryOfflineStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryOfflineStore")
            .field("namespace", &self.config.namespace)
            .finish_non_exhaustive()
    }
}

impl MemoryOfflineStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            state: RwLock::new(State::default()),
        }
    }

    /// Appends source rows to a resource's dataset.
    ///
    /// Existing snapshots are unaffected until the materialization is updated.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the state lock is poisoned.
    pub fn insert_rows(
        &self,
        id: &ResourceId,
        rows: impl IntoIterator<Item = FeatureRow>,
    ) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.datasets.entry(id.clone()).or_default().extend(rows);
        Ok(())
    }

    fn snapshot(&self, id: &ResourceId) -> Result<Arc<MemoryMaterialization>> {
        let state = self.state.read().map_err(poison_err)?;
        let rows = state
            .datasets
            .get(id)
            .ok_or_else(|| Error::DatasetNotFound {
                resource: id.clone(),
            })?;

        let mut latest: BTreeMap<&str, &FeatureRow> = BTreeMap::new();
        for row in rows {
            match latest.get(row.entity.as_str()) {
                Some(current) if current.ts > row.ts => {}
                _ => {
                    latest.insert(row.entity.as_str(), row);
                }
            }
        }

        Ok(Arc::new(MemoryMaterialization {
            id: MaterializationId::for_resource(id),
            rows: Arc::new(latest.into_values().cloned().collect()),
        }))
    }
}

#[async_trait]
impl OfflineStore for MemoryOfflineStore {
    fn provider_type(&self) -> ProviderType {
        ProviderType::MEMORY_OFFLINE
    }

    fn config(&self) -> Result<SerializedConfig> {
        Ok(self.config.serialize_config()?)
    }

    async fn create_materialization(&self, id: &ResourceId) -> Result<Arc<dyn Materialization>> {
        let materialization_id = MaterializationId::for_resource(id);
        if self
            .state
            .read()
            .map_err(poison_err)?
            .materializations
            .contains_key(&materialization_id)
        {
            return Err(Error::MaterializationAlreadyExists {
                id: materialization_id,
            });
        }

        let snapshot = self.snapshot(id)?;
        let mut state = self.state.write().map_err(poison_err)?;
        if state.materializations.contains_key(&materialization_id) {
            return Err(Error::MaterializationAlreadyExists {
                id: materialization_id,
            });
        }
        state
            .materializations
            .insert(materialization_id, Arc::clone(&snapshot));
        Ok(snapshot)
    }

    async fn update_materialization(&self, id: &ResourceId) -> Result<Arc<dyn Materialization>> {
        let materialization_id = MaterializationId::for_resource(id);
        if !self
            .state
            .read()
            .map_err(poison_err)?
            .materializations
            .contains_key(&materialization_id)
        {
            return Err(Error::MaterializationNotFound {
                id: materialization_id,
            });
        }

        let snapshot = self.snapshot(id)?;
        self.state
            .write()
            .map_err(poison_err)?
            .materializations
            .insert(materialization_id, Arc::clone(&snapshot));
        Ok(snapshot)
    }

    async fn get_materialization(
        &self,
        id: &MaterializationId,
    ) -> Result<Arc<dyn Materialization>> {
        self.state
            .read()
            .map_err(poison_err)?
            .materializations
            .get(id)
            .map(|m| Arc::clone(m) as Arc<dyn Materialization>)
            .ok_or_else(|| Error::MaterializationNotFound { id: id.clone() })
    }

    async fn delete_materialization(&self, id: &MaterializationId) -> Result<()> {
        self.state
            .write()
            .map_err(poison_err)?
            .materializations
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::MaterializationNotFound { id: id.clone() })
    }
}

/// Immutable snapshot of a dataset.
#[derive(Debug)]
pub struct MemoryMaterialization {
    id: MaterializationId,
    rows: Arc<Vec<FeatureRow>>,
}

#[async_trait]
impl Materialization for MemoryMaterialization {
    fn id(&self) -> MaterializationId {
        self.id.clone()
    }

    async fn num_rows(&self) -> Result<u64> {
        Ok(self.rows.len() as u64)
    }

    async fn iterate_segment(&self, start: u64, end: u64) -> Result<RowStream> {
        let len = self.rows.len();
        let end = usize::try_from(end).unwrap_or(usize::MAX).min(len);
        let start = usize::try_from(start).unwrap_or(usize::MAX).min(end);
        let rows = Arc::clone(&self.rows);
        let stream = futures::stream::iter(start..end).map(move |i| Ok(rows[i].clone()));
        Ok(stream.boxed())
    }
}
