//! Offline store contract.
//!
//! The offline store owns computed feature datasets and exposes
//! [`Materialization`]s: row-stable snapshots that chunk workers read by
//! row range. Materializations are read-only to everything but the store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use fstore_core::{MaterializationId, ProviderType, ResourceId, SerializedConfig, Value};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One computed feature value for an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    /// Entity identifier.
    pub entity: String,
    /// Feature value.
    pub value: Value,
    /// Event timestamp of the value.
    pub ts: DateTime<Utc>,
}

impl FeatureRow {
    /// Creates a new row.
    #[must_use]
    pub fn new(entity: impl Into<String>, value: impl Into<Value>, ts: DateTime<Utc>) -> Self {
        Self {
            entity: entity.into(),
            value: value.into(),
            ts,
        }
    }
}

/// Stream of rows produced by [`Materialization::iterate_segment`].
pub type RowStream = BoxStream<'static, Result<FeatureRow>>;

/// A store of computed feature datasets.
#[async_trait]
pub trait OfflineStore: Send + Sync {
    /// Returns the provider type tag of this store.
    fn provider_type(&self) -> ProviderType;

    /// Returns the serialized config that rebuilds this store in another process.
    fn config(&self) -> Result<SerializedConfig>;

    /// Creates the first snapshot for a resource.
    ///
    /// Fails with [`Error::MaterializationAlreadyExists`](crate::Error::MaterializationAlreadyExists)
    /// if one exists.
    async fn create_materialization(&self, id: &ResourceId) -> Result<Arc<dyn Materialization>>;

    /// Refreshes the existing snapshot for a resource.
    ///
    /// Fails with [`Error::MaterializationNotFound`](crate::Error::MaterializationNotFound)
    /// if none exists.
    async fn update_materialization(&self, id: &ResourceId) -> Result<Arc<dyn Materialization>>;

    /// Returns an existing snapshot by ID.
    async fn get_materialization(&self, id: &MaterializationId)
        -> Result<Arc<dyn Materialization>>;

    /// Deletes a snapshot by ID.
    async fn delete_materialization(&self, id: &MaterializationId) -> Result<()>;

    /// Releases any connections held by the store.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// A row-addressable snapshot of computed feature values.
#[async_trait]
pub trait Materialization: Send + Sync {
    /// Returns the stable ID of the snapshot.
    fn id(&self) -> MaterializationId;

    /// Returns the number of rows in the snapshot.
    async fn num_rows(&self) -> Result<u64>;

    /// Streams rows in `[start, end)` in snapshot order.
    ///
    /// `end` is clamped to the row count.
    async fn iterate_segment(&self, start: u64, end: u64) -> Result<RowStream>;
}
