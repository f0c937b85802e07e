//! Chunk-copy worker.
//!
//! Reads one row range of a materialization and writes it into the resource's
//! online table. Workers are stateless: everything they need is in their
//! [`ChunkRunnerConfig`], and they only ever read the materialization.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::Instrument;

use fstore_core::observability::chunk_span;
use fstore_core::ResourceId;
use fstore_provider::{OfflineStore, OnlineStore};

use crate::chunk::chunk_bounds;
use crate::config::ChunkRunnerConfig;
use crate::error::{Error, Result};
use crate::metrics::{ChunkTimer, RunnerMetrics};
use crate::runner::Runner;
use crate::watcher::{spawn_watched, CompletionWatcher};

/// Copies one chunk of a materialization into its online table.
pub struct CopyToOnlineRunner {
    online: Arc<dyn OnlineStore>,
    offline: Arc<dyn OfflineStore>,
    config: ChunkRunnerConfig,
    metrics: RunnerMetrics,
}

impl std::fmt::Debug for CopyToOnlineRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopyToOnlineRunner")
            .field("online", &self.online.provider_type())
            .field("offline", &self.offline.provider_type())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CopyToOnlineRunner {
    /// Creates a worker for the chunk named in `config`.
    #[must_use]
    pub fn new(
        online: Arc<dyn OnlineStore>,
        offline: Arc<dyn OfflineStore>,
        config: ChunkRunnerConfig,
    ) -> Self {
        Self {
            online,
            offline,
            config,
            metrics: RunnerMetrics::new(),
        }
    }

    /// Sets the metrics recorder.
    #[must_use]
    pub const fn with_metrics(mut self, metrics: RunnerMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Returns the worker's payload.
    #[must_use]
    pub fn config(&self) -> &ChunkRunnerConfig {
        &self.config
    }

    /// Copies the chunk and returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns an error if the materialization or table cannot be opened,
    /// the chunk index is out of range, or any row fails to read or write.
    /// Rows written before the failure stay written.
    pub async fn copy(&self) -> Result<u64> {
        copy_chunk(
            Arc::clone(&self.online),
            Arc::clone(&self.offline),
            self.config.clone(),
            self.metrics,
        )
        .await
    }
}

async fn copy_chunk(
    online: Arc<dyn OnlineStore>,
    offline: Arc<dyn OfflineStore>,
    config: ChunkRunnerConfig,
    metrics: RunnerMetrics,
) -> Result<u64> {
    let resource = &config.resource_id;
    let span = chunk_span(&resource.name, &resource.variant, config.chunk_index);
    let timer = ChunkTimer::start();

    let outcome = async {
        tracing::info!(fields = ?config.log_fields, "starting chunk copy");
        let materialization = offline.get_materialization(&config.materialized_id).await?;
        let table = online.get_table(&resource.name, &resource.variant).await?;
        let num_rows = materialization.num_rows().await?;
        let range = chunk_bounds(config.chunk_index, config.chunk_size, num_rows)?;

        let mut rows = materialization.iterate_segment(range.start, range.end).await?;
        let mut written = 0_u64;
        while let Some(row) = rows.next().await {
            let row = row?;
            table.set(&row.entity, row.value).await?;
            written += 1;
        }
        tracing::info!(
            start = range.start,
            end = range.end,
            count = written,
            "chunk copy complete"
        );
        Ok::<u64, Error>(written)
    }
    .instrument(span.clone())
    .await;

    match &outcome {
        Ok(written) => {
            metrics.record_rows_written(*written);
            timer.finish(&metrics, true);
        }
        Err(err) => {
            span.in_scope(|| tracing::error!(error = %err, "chunk copy failed"));
            metrics.record_chunk_failure();
            timer.finish(&metrics, false);
        }
    }
    outcome
}

#[async_trait]
impl Runner for CopyToOnlineRunner {
    async fn run(&self) -> Result<Arc<dyn CompletionWatcher>> {
        let resource = &self.config.resource_id;
        let description = format!(
            "copy {} ({}) chunk {}",
            resource.name, resource.variant, self.config.chunk_index
        );
        let work = copy_chunk(
            Arc::clone(&self.online),
            Arc::clone(&self.offline),
            self.config.clone(),
            self.metrics,
        );
        Ok(spawn_watched(description, async move { work.await.map(|_| ()) }))
    }

    fn resource(&self) -> &ResourceId {
        &self.config.resource_id
    }

    fn is_update_job(&self) -> bool {
        false
    }
}
