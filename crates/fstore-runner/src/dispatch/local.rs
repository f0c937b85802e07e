//! In-process chunk dispatch.
//!
//! Every chunk becomes a `COPY_TO_ONLINE` runner built through the
//! [`RunnerFactory`] from its serialized payload, exactly as a cluster worker
//! would build it, and runs as its own tokio task. Workers share only the
//! store handles the registry hands out.

use std::sync::Arc;

use async_trait::async_trait;

use super::ChunkDispatcher;
use crate::chunk::ChunkPlan;
use crate::config::ChunkRunnerConfig;
use crate::error::Result;
use crate::runner::{RunnerFactory, RunnerKind};
use crate::watcher::{CompletedWatcher, CompletionWatcher, WatcherMultiplex};

/// Runs chunk workers as concurrent tasks in this process.
#[derive(Debug, Clone)]
pub struct LocalDispatcher {
    factory: RunnerFactory,
}

impl LocalDispatcher {
    /// Creates a dispatcher that builds workers with `factory`.
    #[must_use]
    pub const fn new(factory: RunnerFactory) -> Self {
        Self { factory }
    }

    async fn start_chunk(
        &self,
        config: &ChunkRunnerConfig,
        chunk_index: u64,
    ) -> Result<Arc<dyn CompletionWatcher>> {
        let payload = config.for_chunk(chunk_index).serialize()?;
        let runner = self.factory.create(RunnerKind::CopyToOnline, &payload)?;
        runner.run().await
    }
}

#[async_trait]
impl ChunkDispatcher for LocalDispatcher {
    fn backend(&self) -> &'static str {
        "local"
    }

    async fn dispatch(
        &self,
        plan: ChunkPlan,
        config: &ChunkRunnerConfig,
    ) -> Result<Arc<dyn CompletionWatcher>> {
        let mut watchers: Vec<Arc<dyn CompletionWatcher>> = Vec::new();
        for chunk_index in 0..plan.num_chunks {
            tracing::debug!(chunk = chunk_index, "creating local runner");
            match self.start_chunk(config, chunk_index).await {
                Ok(watcher) => watchers.push(watcher),
                // Chunks already started keep running; the aggregate stays
                // pending until they finish and then reports this failure.
                Err(err) if !watchers.is_empty() => {
                    tracing::error!(chunk = chunk_index, error = %err, "failed to start local runner");
                    let description = format!("local chunk {chunk_index}");
                    watchers.push(Arc::new(CompletedWatcher::failure(description, err)));
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(Arc::new(WatcherMultiplex::new(watchers)))
    }
}
