//! Chunk dispatch.
//!
//! A [`ChunkDispatcher`] turns a [`ChunkPlan`] into running chunk workers and
//! hands back one watcher over all of them:
//!
//! - [`local::LocalDispatcher`]: one tokio task per chunk in this process
//! - [`cluster::ClusterDispatcher`]: one cluster job with a task per chunk
//! - [`memory::InMemoryJobScheduler`]: a [`JobScheduler`] that runs cluster
//!   jobs in-process, for tests and development
//!
//! The backend is chosen by configuration, never by data size. Callers cannot
//! tell which backend ran the chunks except through timing.

pub mod cluster;
pub mod local;
pub mod memory;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use fstore_core::ResourceId;

use crate::chunk::ChunkPlan;
use crate::config::ChunkRunnerConfig;
use crate::error::Result;
use crate::watcher::CompletionWatcher;

/// Environment variable naming the job kind a worker runs.
pub const ENV_NAME: &str = "NAME";
/// Environment variable holding the serialized runner config.
pub const ENV_CONFIG: &str = "CONFIG";
/// Environment variable holding a worker's task position within its job.
pub const ENV_JOB_COMPLETION_INDEX: &str = "JOB_COMPLETION_INDEX";
/// Environment variable forwarding the transformation runner image.
pub const ENV_TRANSFORM_RUNNER_IMAGE: &str = "TRANSFORM_RUNNER_IMAGE";

/// Executes the chunks of a materialization.
#[async_trait]
pub trait ChunkDispatcher: Send + Sync {
    /// Returns the backend label used in logs and metrics.
    fn backend(&self) -> &'static str;

    /// Starts one worker per chunk in `plan`.
    ///
    /// `config` is the worker payload shared by every chunk; each worker
    /// copies the chunk named by its own index.
    ///
    /// # Errors
    ///
    /// Returns an error if the workers could not be started. Failures of
    /// started workers are reported through the returned watcher.
    async fn dispatch(
        &self,
        plan: ChunkPlan,
        config: &ChunkRunnerConfig,
    ) -> Result<Arc<dyn CompletionWatcher>>;
}

/// A cluster job: one container image run as `num_tasks` parallel tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Prefix for the job name.
    pub job_prefix: String,
    /// Environment shared by every task.
    pub env_vars: BTreeMap<String, String>,
    /// Container image.
    pub image: String,
    /// Number of parallel tasks.
    pub num_tasks: u64,
    /// Resource being materialized.
    pub resource: ResourceId,
}

impl JobSpec {
    /// Returns the job name: `<prefix>-<name>-<variant>`, lowercased, with
    /// characters outside `[a-z0-9-]` replaced by `-`.
    #[must_use]
    pub fn job_name(&self) -> String {
        format!(
            "{}-{}-{}",
            self.job_prefix, self.resource.name, self.resource.variant
        )
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
    }
}

/// Accepts cluster jobs.
#[async_trait]
pub trait JobScheduler: Send + Sync {
    /// Submits a job and returns a watcher over all of its tasks.
    ///
    /// # Errors
    ///
    /// Returns a dispatch error if the scheduler rejects the job.
    async fn submit(&self, job: JobSpec) -> Result<Arc<dyn CompletionWatcher>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_name_is_sanitized() {
        let job = JobSpec {
            job_prefix: "materialize".into(),
            env_vars: BTreeMap::new(),
            image: "img".into(),
            num_tasks: 1,
            resource: ResourceId::feature("Avg_Txn", "v1.2"),
        };
        assert_eq!(job.job_name(), "materialize-avg-txn-v1-2");
    }
}
