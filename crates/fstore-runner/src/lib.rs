//! # fstore-runner
//!
//! Materialization engine: copies a computed offline dataset into a
//! low-latency online table, in parallel chunks.
//!
//! - **Watchers**: [`CompletionWatcher`] handles over asynchronous work, the
//!   [`WatcherMultiplex`] aggregate, and the one-shot [`SyncWatcher`]
//! - **Chunking**: [`ChunkPlan`] splits a materialization into bounded row ranges
//! - **Dispatch**: local tasks or cluster jobs behind [`ChunkDispatcher`]
//! - **Orchestration**: [`MaterializeRunner`] provisions the online table
//!   (and vector index) and dispatches the chunks
//! - **Registry**: [`RunnerFactory`] rebuilds runners from serialized payloads,
//!   in this process or in a worker process
//!
//! ## Guarantees
//!
//! - Table creation happens once; a collision on a fresh run is an error,
//!   on an update run the table is reused
//! - Embedding resources need a vector-capable online store, checked before
//!   any table is created
//! - Every row of the materialization is written by exactly one chunk
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use fstore_core::{ProviderConfig, ProviderType, ResourceId, ScalarType, ValueType};
//! use fstore_provider::config::MemoryConfig;
//! use fstore_provider::ProviderRegistry;
//! use fstore_runner::config::{DispatchConfig, JobCloud, MaterializeRunnerConfig};
//! use fstore_runner::{Runner, RunnerFactory};
//!
//! # async fn example() -> fstore_runner::Result<()> {
//! let factory = RunnerFactory::new(
//!     Arc::new(ProviderRegistry::with_defaults()),
//!     DispatchConfig::from_env()?,
//! );
//! let config = MaterializeRunnerConfig {
//!     online_type: ProviderType::LOCAL_ONLINE,
//!     offline_type: ProviderType::MEMORY_OFFLINE,
//!     online_config: MemoryConfig::new("serving").serialize_config()?,
//!     offline_config: MemoryConfig::new("warehouse").serialize_config()?,
//!     resource_id: ResourceId::feature("avg_txn", "v1"),
//!     value_type: ValueType::Scalar(ScalarType::Float32),
//!     cloud: JobCloud::Local,
//!     is_update: false,
//! };
//!
//! let runner = factory.materialize_runner(&config)?;
//! let watcher = runner.run().await?;
//! watcher.wait().await.map_err(|e| fstore_runner::Error::watch("materialize", e))?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod chunk;
pub mod config;
pub mod copy;
pub mod dispatch;
pub mod error;
pub mod materialize;
pub mod metrics;
pub mod runner;
pub mod watcher;
pub mod worker;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::chunk::ChunkPlan;
    pub use crate::config::{ChunkRunnerConfig, DispatchConfig, JobCloud, MaterializeRunnerConfig};
    pub use crate::error::{Error, Result};
    pub use crate::runner::{Runner, RunnerFactory, RunnerKind};
    pub use crate::watcher::{CompletionWatcher, SyncWatcher, WatcherMultiplex};
}

pub use chunk::{ChunkPlan, MAX_CHUNK_ROWS};
pub use copy::CopyToOnlineRunner;
pub use dispatch::{ChunkDispatcher, JobScheduler, JobSpec};
pub use error::{Error, Result};
pub use materialize::MaterializeRunner;
pub use runner::{Runner, RunnerFactory, RunnerKind};
pub use watcher::{CompletedWatcher, CompletionWatcher, SyncWatcher, WatchResult, WatcherMultiplex};
