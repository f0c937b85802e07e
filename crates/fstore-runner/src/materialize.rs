//! Materialization orchestrator.
//!
//! [`MaterializeRunner::run`] walks a resource through:
//!
//! 1. create (or, on update runs, refresh) the offline materialization
//! 2. for embedding vectors, create the vector index
//! 3. create the online table
//! 4. plan chunks and dispatch them
//!
//! Steps 1-3 fail synchronously, before a watcher exists. From step 4 on,
//! failures only surface through the returned watcher. `run` returns as soon
//! as the chunks are dispatched; a background task carries the dispatch
//! outcome into the runner's own watcher.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::Instrument;

use fstore_core::observability::materialize_span;
use fstore_core::{MaterializationId, ResourceId, ValueType};
use fstore_provider::{Materialization, OfflineStore, OnlineStore, VECTOR_STORE_CAPABILITY};

use crate::chunk::{ChunkPlan, MAX_CHUNK_ROWS};
use crate::config::ChunkRunnerConfig;
use crate::dispatch::ChunkDispatcher;
use crate::error::{Error, Result};
use crate::metrics::RunnerMetrics;
use crate::runner::Runner;
use crate::watcher::{spawn_watched, CompletedWatcher, CompletionWatcher};

/// Orchestrates the materialization of one resource into its online table.
pub struct MaterializeRunner {
    online: Arc<dyn OnlineStore>,
    offline: Arc<dyn OfflineStore>,
    resource_id: ResourceId,
    value_type: ValueType,
    is_update: bool,
    max_chunk_rows: u64,
    dispatcher: Arc<dyn ChunkDispatcher>,
    metrics: RunnerMetrics,
}

impl std::fmt::Debug for MaterializeRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaterializeRunner")
            .field("resource_id", &self.resource_id)
            .field("value_type", &self.value_type)
            .field("is_update", &self.is_update)
            .field("max_chunk_rows", &self.max_chunk_rows)
            .field("backend", &self.dispatcher.backend())
            .finish_non_exhaustive()
    }
}

impl MaterializeRunner {
    /// Creates a runner for a first-time materialization.
    #[must_use]
    pub fn new(
        online: Arc<dyn OnlineStore>,
        offline: Arc<dyn OfflineStore>,
        resource_id: ResourceId,
        value_type: ValueType,
        dispatcher: Arc<dyn ChunkDispatcher>,
    ) -> Self {
        Self {
            online,
            offline,
            resource_id,
            value_type,
            is_update: false,
            max_chunk_rows: MAX_CHUNK_ROWS,
            dispatcher,
            metrics: RunnerMetrics::new(),
        }
    }

    /// Marks the run as an update of an existing materialization.
    #[must_use]
    pub const fn with_update(mut self, is_update: bool) -> Self {
        self.is_update = is_update;
        self
    }

    /// Overrides the maximum rows per chunk.
    #[must_use]
    pub const fn with_max_chunk_rows(mut self, max_chunk_rows: u64) -> Self {
        self.max_chunk_rows = max_chunk_rows;
        self
    }

    fn description(&self) -> String {
        format!(
            "materialize {} ({})",
            self.resource_id.name, self.resource_id.variant
        )
    }

    async fn prepare_materialization(&self) -> Result<Arc<dyn Materialization>> {
        let materialization = if self.is_update {
            tracing::info!("updating materialization");
            self.offline.update_materialization(&self.resource_id).await?
        } else {
            tracing::info!("creating materialization");
            self.offline.create_materialization(&self.resource_id).await?
        };
        Ok(materialization)
    }

    async fn prepare_index(&self) -> Result<()> {
        let Some(vector_type) = self.value_type.as_vector().filter(|v| v.is_embedding) else {
            return Ok(());
        };
        let vector_store = self.online.as_vector_store().ok_or_else(|| {
            fstore_provider::Error::UnsupportedCapability {
                provider: self.online.provider_type(),
                capability: VECTOR_STORE_CAPABILITY,
            }
        })?;
        tracing::info!(dimension = vector_type.dimension, "creating vector index");
        vector_store
            .create_index(
                &self.resource_id.name,
                &self.resource_id.variant,
                &vector_type,
            )
            .await
            .inspect_err(|e| tracing::error!(error = %e, "create index error"))?;
        Ok(())
    }

    async fn prepare_table(&self) -> Result<()> {
        let ResourceId { name, variant, .. } = &self.resource_id;
        tracing::info!("creating online table");
        match self.online.create_table(name, variant, &self.value_type).await {
            Ok(_) => Ok(()),
            Err(fstore_provider::Error::TableAlreadyExists { .. }) if self.is_update => {
                tracing::info!("online table already exists, reusing it for update");
                Ok(())
            }
            Err(fstore_provider::Error::TableAlreadyExists { .. }) => {
                tracing::error!("table already exists despite being new job");
                Err(Error::TableExistsOnNewRun {
                    name: name.clone(),
                    variant: variant.clone(),
                })
            }
            Err(e) => {
                tracing::error!(error = %e, "create table error");
                Err(e.into())
            }
        }
    }

    async fn dispatch(
        &self,
        materialization: &dyn Materialization,
    ) -> Result<Arc<dyn CompletionWatcher>> {
        let num_rows = materialization.num_rows().await?;
        let plan = ChunkPlan::compute(num_rows, self.max_chunk_rows);
        tracing::info!(
            count = num_rows,
            chunks = plan.num_chunks,
            chunk_size = plan.chunk_size,
            backend = self.dispatcher.backend(),
            "dispatching chunks"
        );

        let config = self.chunk_config(materialization.id(), plan.chunk_size)?;
        let watcher = self.dispatcher.dispatch(plan, &config).await?;
        self.metrics
            .record_chunks_dispatched(self.dispatcher.backend(), plan.num_chunks);
        Ok(watcher)
    }

    async fn run_steps(&self) -> Result<Arc<dyn CompletionWatcher>> {
        tracing::info!(update = self.is_update, "starting materialization");
        self.metrics.record_materialization(self.is_update);

        self.resource_id.validate()?;
        let materialization = self.prepare_materialization().await?;
        self.prepare_index().await?;
        self.prepare_table().await?;

        let description = self.description();
        let dispatched = match self.dispatch(materialization.as_ref()).await {
            Ok(watcher) => watcher,
            Err(err) => {
                tracing::error!(error = %err, "dispatch failed");
                return Ok(Arc::new(CompletedWatcher::failure(description, err)));
            }
        };

        let waiter = async move {
            dispatched
                .wait()
                .await
                .map_err(|err| Error::watch("cloud watch", err))
        };
        Ok(spawn_watched(description, waiter.in_current_span()))
    }

    fn chunk_config(
        &self,
        materialized_id: MaterializationId,
        chunk_size: u64,
    ) -> Result<ChunkRunnerConfig> {
        let mut log_fields = BTreeMap::new();
        log_fields.insert("name".to_string(), self.resource_id.name.clone());
        log_fields.insert("variant".to_string(), self.resource_id.variant.clone());
        log_fields.insert("materialization".to_string(), materialized_id.to_string());
        Ok(ChunkRunnerConfig {
            online_type: self.online.provider_type(),
            offline_type: self.offline.provider_type(),
            online_config: self.online.config()?,
            offline_config: self.offline.config()?,
            materialized_id,
            resource_id: self.resource_id.clone(),
            chunk_size,
            chunk_index: 0,
            log_fields,
        })
    }
}

#[async_trait]
impl Runner for MaterializeRunner {
    async fn run(&self) -> Result<Arc<dyn CompletionWatcher>> {
        let span = materialize_span("run", &self.resource_id.name, &self.resource_id.variant);
        self.run_steps().instrument(span).await
    }

    fn resource(&self) -> &ResourceId {
        &self.resource_id
    }

    fn is_update_job(&self) -> bool {
        self.is_update
    }
}
