//! Cluster chunk dispatch.
//!
//! Submits a single job with one task per chunk. Every task receives the same
//! environment: the job kind in `NAME` and the serialized worker payload in
//! `CONFIG`. A task finds its chunk through its position in the job
//! (`JOB_COMPLETION_INDEX`), so the payload itself names no chunk.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{
    ChunkDispatcher, JobScheduler, JobSpec, ENV_CONFIG, ENV_NAME, ENV_TRANSFORM_RUNNER_IMAGE,
};
use crate::chunk::ChunkPlan;
use crate::config::{ChunkRunnerConfig, DispatchConfig};
use crate::error::{Error, Result};
use crate::runner::RunnerKind;
use crate::watcher::{CompletedWatcher, CompletionWatcher};

/// Dispatches chunks as tasks of a cluster job.
pub struct ClusterDispatcher {
    scheduler: Arc<dyn JobScheduler>,
    config: DispatchConfig,
}

impl std::fmt::Debug for ClusterDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterDispatcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ClusterDispatcher {
    /// Creates a dispatcher submitting to `scheduler`.
    #[must_use]
    pub fn new(scheduler: Arc<dyn JobScheduler>, config: DispatchConfig) -> Self {
        Self { scheduler, config }
    }

    /// Builds the job for `plan` without submitting it.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the payload cannot be encoded.
    pub fn job_spec(&self, plan: ChunkPlan, config: &ChunkRunnerConfig) -> Result<JobSpec> {
        let payload = String::from_utf8(config.for_chunk(0).serialize()?)
            .map_err(|e| Error::serialization(format!("worker payload is not UTF-8: {e}")))?;

        let mut env_vars = BTreeMap::new();
        env_vars.insert(ENV_NAME.to_string(), RunnerKind::CopyToOnline.to_string());
        env_vars.insert(ENV_CONFIG.to_string(), payload);
        if let Some(image) = &self.config.transform_runner_image {
            env_vars.insert(ENV_TRANSFORM_RUNNER_IMAGE.to_string(), image.clone());
        }

        Ok(JobSpec {
            job_prefix: self.config.job_prefix.clone(),
            env_vars,
            image: self.config.worker_image.clone(),
            num_tasks: plan.num_chunks,
            resource: config.resource_id.clone(),
        })
    }
}

#[async_trait]
impl ChunkDispatcher for ClusterDispatcher {
    fn backend(&self) -> &'static str {
        "cluster"
    }

    async fn dispatch(
        &self,
        plan: ChunkPlan,
        config: &ChunkRunnerConfig,
    ) -> Result<Arc<dyn CompletionWatcher>> {
        let job = self.job_spec(plan, config)?;
        let name = job.job_name();
        if plan.num_chunks == 0 {
            tracing::info!(job = %name, "no chunks to run, skipping job submission");
            return Ok(Arc::new(CompletedWatcher::success(name)));
        }
        tracing::info!(job = %name, tasks = plan.num_chunks, image = %job.image, "submitting job");
        self.scheduler
            .submit(job)
            .await
            .inspect_err(|e| tracing::error!(job = %name, error = %e, "job submission failed"))
    }
}
