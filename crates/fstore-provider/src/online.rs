//! Online store contract.
//!
//! An [`OnlineStore`] owns one [`OnlineTable`] per `(name, variant)`. Tables
//! are keyed by entity identifier and hold values of a declared
//! [`ValueType`]; writes are coerced into that type.
//!
//! Vector search is an optional capability. Callers discover it through
//! [`OnlineStore::as_vector_store`] and [`OnlineTable::as_vector_table`],
//! which return `None` for backends that do not implement it.
//!
//! ## Concurrency
//!
//! Stores and tables are shared across concurrently running chunk workers.
//! Concurrent `set` calls on the same table must not corrupt state;
//! overlapping writes to one entity resolve last-write-wins.

use std::sync::Arc;

use async_trait::async_trait;
use fstore_core::{ProviderType, SerializedConfig, Value, ValueType, VectorType};

use crate::error::Result;

/// Capability name reported when vector search is missing.
pub const VECTOR_STORE_CAPABILITY: &str = "vector store";

/// A low-latency store serving feature values by entity.
#[async_trait]
pub trait OnlineStore: Send + Sync {
    /// Returns the provider type tag of this store.
    fn provider_type(&self) -> ProviderType;

    /// Returns the serialized config that rebuilds this store in another process.
    fn config(&self) -> Result<SerializedConfig>;

    /// Creates a table for `(name, variant)`.
    ///
    /// Returns [`Error::TableAlreadyExists`](crate::Error::TableAlreadyExists)
    /// if the table is already present, so retries can tell a collision from
    /// a genuine failure.
    async fn create_table(
        &self,
        name: &str,
        variant: &str,
        value_type: &ValueType,
    ) -> Result<Arc<dyn OnlineTable>>;

    /// Returns the table for `(name, variant)`.
    async fn get_table(&self, name: &str, variant: &str) -> Result<Arc<dyn OnlineTable>>;

    /// Deletes the table for `(name, variant)` and all its values.
    async fn delete_table(&self, name: &str, variant: &str) -> Result<()>;

    /// Releases any connections held by the store.
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Returns the vector search capability, if implemented.
    fn as_vector_store(&self) -> Option<&dyn VectorStore> {
        None
    }
}

/// A mutable entity → value table for one resource.
#[async_trait]
pub trait OnlineTable: Send + Sync {
    /// Returns the declared value type of the table.
    fn value_type(&self) -> ValueType;

    /// Writes a value for an entity, coercing it into the declared type.
    async fn set(&self, entity: &str, value: Value) -> Result<()>;

    /// Reads the value for an entity.
    ///
    /// Returns [`Error::EntityNotFound`](crate::Error::EntityNotFound) if the
    /// entity has never been written.
    async fn get(&self, entity: &str) -> Result<Value>;

    /// Returns the nearest-neighbour capability, if implemented.
    fn as_vector_table(&self) -> Option<&dyn VectorStoreTable> {
        None
    }
}

/// An online store that can build similarity indexes.
#[async_trait]
pub trait VectorStore: OnlineStore {
    /// Creates the similarity index for an embedding resource.
    ///
    /// Must be called before the table is created. Creating an index that
    /// already exists with the same dimension is a no-op.
    async fn create_index(&self, name: &str, variant: &str, vector_type: &VectorType)
        -> Result<()>;

    /// Returns the indexed table for `(name, variant)`.
    async fn get_vector_table(
        &self,
        name: &str,
        variant: &str,
    ) -> Result<Arc<dyn VectorStoreTable>>;
}

/// An online table that answers nearest-neighbour queries.
#[async_trait]
pub trait VectorStoreTable: OnlineTable {
    /// Returns up to `k` entity IDs ordered by ascending distance to `query`.
    ///
    /// If fewer than `k` vectors are indexed, all of them are returned.
    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<String>>;
}
