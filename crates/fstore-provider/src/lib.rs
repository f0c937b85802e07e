//! # fstore-provider
//!
//! Store abstraction for the fstore materialization engine.
//!
//! - **Online stores**: [`OnlineStore`] / [`OnlineTable`] with the optional
//!   [`VectorStore`] / [`VectorStoreTable`] similarity-search capability
//! - **Offline stores**: [`OfflineStore`] and row-stable [`Materialization`]s
//! - **Backends**: in-process map, in-process vector search, blob-backed,
//!   and in-process offline stores
//! - **Registry**: [`ProviderRegistry`] rebuilds stores from
//!   `(ProviderType, SerializedConfig)` pairs
//!
//! ## Example
//!
//! ```rust
//! use fstore_core::{ScalarType, Value, ValueType};
//! use fstore_provider::backends::MemoryOnlineStore;
//! use fstore_provider::config::MemoryConfig;
//! use fstore_provider::OnlineStore;
//!
//! # tokio_test::block_on(async {
//! let store = MemoryOnlineStore::new(MemoryConfig::default());
//! let table = store
//!     .create_table("avg_txn", "v1", &ValueType::Scalar(ScalarType::Int64))
//!     .await?;
//! table.set("user_1", Value::Int(1)).await?;
//! assert_eq!(table.get("user_1").await?, Value::Int64(1));
//! # Ok::<(), fstore_provider::Error>(())
//! # }).unwrap();
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod backends;
pub mod blob;
pub mod config;
pub mod error;
pub mod offline;
pub mod online;
pub mod registry;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::offline::{FeatureRow, Materialization, OfflineStore};
    pub use crate::online::{OnlineStore, OnlineTable, VectorStore, VectorStoreTable};
    pub use crate::registry::{Provider, ProviderRegistry};
}

pub use error::{Error, Result};
pub use offline::{FeatureRow, Materialization, OfflineStore, RowStream};
pub use online::{OnlineStore, OnlineTable, VectorStore, VectorStoreTable, VECTOR_STORE_CAPABILITY};
pub use registry::{Provider, ProviderFactory, ProviderRegistry};
