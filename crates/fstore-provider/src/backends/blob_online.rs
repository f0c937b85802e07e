//! Blob-backed online store.
//!
//! Layout under the configured prefix:
//!
//! ```text
//! {prefix}/{name}/{variant}/_table.json          table metadata (declared type)
//! {prefix}/{name}/{variant}/entities/{entity}    JSON-encoded value
//! ```
//!
//! Path components are escaped so arbitrary names and entities stay inside
//! their table directory. Values are stored as plain JSON and decoded back
//! into the table's declared type on read.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use fstore_core::{ProviderConfig, ProviderType, SerializedConfig, Value, ValueType};
use serde::{Deserialize, Serialize};

use crate::blob::{BlobStorage, WritePrecondition, WriteResult};
use crate::config::BlobConfig;
use crate::error::{Error, Result};
use crate::online::{OnlineStore, OnlineTable};

const TABLE_META: &str = "_table.json";

#[derive(Debug, Serialize, Deserialize)]
struct TableMeta {
    value_type: ValueType,
}

/// Escapes a path component.
///
/// Unreserved characters pass through; everything else, including `/`, is
/// percent-encoded. The empty string maps to `~`.
fn escape(component: &str) -> String {
    if component.is_empty() {
        return "~".to_string();
    }
    let only_dots = component.bytes().all(|b| b == b'.');
    let mut out = String::with_capacity(component.len());
    for byte in component.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' => out.push(char::from(byte)),
            b'.' if !only_dots => out.push('.'),
            _ => {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    out
}

/// Online store persisting tables as objects in blob storage.
pub struct BlobOnlineStore {
    config: BlobConfig,
    storage: Arc<dyn BlobStorage>,
}

impl std::fmt::Debug for BlobOnlineStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobOnlineStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BlobOnlineStore {
    /// Creates a store over the given storage.
    #[must_use]
    pub fn new(config: BlobConfig, storage: Arc<dyn BlobStorage>) -> Self {
        Self { config, storage }
    }

    fn table_dir(&self, name: &str, variant: &str) -> String {
        let prefix = self.config.prefix.trim_matches('/');
        if prefix.is_empty() {
            format!("{}/{}", escape(name), escape(variant))
        } else {
            format!("{prefix}/{}/{}", escape(name), escape(variant))
        }
    }

    fn open(&self, dir: String, value_type: ValueType) -> Arc<BlobTable> {
        Arc::new(BlobTable {
            dir,
            value_type,
            storage: Arc::clone(&self.storage),
        })
    }
}

#[async_trait]
impl OnlineStore for BlobOnlineStore {
    fn provider_type(&self) -> ProviderType {
        ProviderType::BLOB_ONLINE
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
        let dir = self.table_dir(name, variant);
        let meta = serde_json::to_vec(&TableMeta {
            value_type: *value_type,
        })
        .map_err(|e| Error::serialization(format!("failed to encode table metadata: {e}")))?;

        let result = self
            .storage
            .put(
                &format!("{dir}/{TABLE_META}"),
                Bytes::from(meta),
                WritePrecondition::DoesNotExist,
            )
            .await?;
        match result {
            WriteResult::Success => Ok(self.open(dir, *value_type)),
            WriteResult::PreconditionFailed => Err(Error::table_exists(name, variant)),
        }
    }

    async fn get_table(&self, name: &str, variant: &str) -> Result<Arc<dyn OnlineTable>> {
        let dir = self.table_dir(name, variant);
        let raw = self
            .storage
            .get(&format!("{dir}/{TABLE_META}"))
            .await?
            .ok_or_else(|| Error::table_not_found(name, variant))?;
        let meta: TableMeta = serde_json::from_slice(&raw)
            .map_err(|e| Error::serialization(format!("corrupt table metadata: {e}")))?;
        Ok(self.open(dir, meta.value_type))
    }

    async fn delete_table(&self, name: &str, variant: &str) -> Result<()> {
        let dir = self.table_dir(name, variant);
        let meta_path = format!("{dir}/{TABLE_META}");
        if self.storage.get(&meta_path).await?.is_none() {
            return Err(Error::table_not_found(name, variant));
        }
        for path in self.storage.list(&format!("{dir}/entities/")).await? {
            self.storage.delete(&path).await?;
        }
        self.storage.delete(&meta_path).await
    }
}

/// Table handle over blob storage.
pub struct BlobTable {
    dir: String,
    value_type: ValueType,
    storage: Arc<dyn BlobStorage>,
}

impl BlobTable {
    fn entity_path(&self, entity: &str) -> String {
        format!("{}/entities/{}", self.dir, escape(entity))
    }
}

#[async_trait]
impl OnlineTable for BlobTable {
    fn value_type(&self) -> ValueType {
        self.value_type
    }

    async fn set(&self, entity: &str, value: Value) -> Result<()> {
        let value = value.coerce(&self.value_type)?;
        let encoded = serde_json::to_vec(&value.to_json())
            .map_err(|e| Error::serialization(format!("failed to encode value: {e}")))?;
        self.storage
            .put(
                &self.entity_path(entity),
                Bytes::from(encoded),
                WritePrecondition::None,
            )
            .await?;
        Ok(())
    }

    async fn get(&self, entity: &str) -> Result<Value> {
        let raw = self
            .storage
            .get(&self.entity_path(entity))
            .await?
            .ok_or_else(|| Error::entity_not_found(entity))?;
        let json: serde_json::Value = serde_json::from_slice(&raw)
            .map_err(|e| Error::serialization(format!("corrupt value for {entity}: {e}")))?;
        Ok(Value::from_json(&json, &self.value_type)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::{FileBlobStorage, MemoryBlobStorage};
    use fstore_core::ScalarType;

    fn memory_store() -> BlobOnlineStore {
        BlobOnlineStore::new(
            BlobConfig::memory("test").with_prefix("features"),
            Arc::new(MemoryBlobStorage::new()),
        )
    }

    #[test]
    fn escape_keeps_components_flat() {
        assert_eq!(escape("avg_txn"), "avg_txn");
        assert_eq!(escape("a/b"), "a%2Fb");
        assert_eq!(escape(""), "~");
        assert_eq!(escape(".."), "%2E%2E");
        assert_eq!(escape("v1.2"), "v1.2");
    }

    #[tokio::test]
    async fn decodes_into_declared_type() -> Result<()> {
        let store = memory_store();
        let int64 = store
            .create_table("i", "v", &ValueType::Scalar(ScalarType::Int64))
            .await?;
        int64.set("e", Value::Int(1)).await?;
        assert_eq!(int64.get("e").await?, Value::Int64(1));

        let float32 = store
            .create_table("f", "v", &ValueType::Scalar(ScalarType::Float32))
            .await?;
        float32.set("e", Value::Float64(0.5)).await?;
        assert_eq!(float32.get("e").await?, Value::Float32(0.5));
        Ok(())
    }

    #[tokio::test]
    async fn reopened_table_keeps_type() -> Result<()> {
        let store = memory_store();
        store
            .create_table("f", "", &ValueType::Scalar(ScalarType::Bool))
            .await?;
        let table = store.get_table("f", "").await?;
        assert_eq!(table.value_type(), ValueType::Scalar(ScalarType::Bool));
        table.set("e", Value::from("false")).await?;
        assert_eq!(table.get("e").await?, Value::Bool(false));
        Ok(())
    }

    #[tokio::test]
    async fn delete_removes_entities() -> Result<()> {
        let store = memory_store();
        let table = store
            .create_table("f", "v", &ValueType::Scalar(ScalarType::String))
            .await?;
        table.set("e", Value::from("x")).await?;
        store.delete_table("f", "v").await?;
        assert!(matches!(
            store.get_table("f", "v").await,
            Err(Error::TableNotFound { .. })
        ));

        let table = store
            .create_table("f", "v", &ValueType::Scalar(ScalarType::String))
            .await?;
        assert!(matches!(
            table.get("e").await,
            Err(Error::EntityNotFound { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn filesystem_backend_detects_existing_table() -> Result<()> {
        let dir = tempfile::tempdir().map_err(|e| Error::storage_with_source("tempdir", e))?;
        let config = BlobConfig::local_fs(dir.path());
        let first = BlobOnlineStore::new(config.clone(), Arc::new(FileBlobStorage::new(dir.path())));
        let second = BlobOnlineStore::new(config, Arc::new(FileBlobStorage::new(dir.path())));

        let ty = ValueType::Scalar(ScalarType::Int32);
        first.create_table("f", "v", &ty).await?;
        assert!(matches!(
            second.create_table("f", "v", &ty).await,
            Err(Error::TableAlreadyExists { .. })
        ));

        first.get_table("f", "v").await?.set("e", Value::Int(7)).await?;
        assert_eq!(second.get_table("f", "v").await?.get("e").await?, Value::Int32(7));
        Ok(())
    }
}
