//! In-memory job scheduler for testing.
//!
//! [`InMemoryJobScheduler`] accepts cluster jobs and runs each task as a tokio
//! task in this process, giving every task the job's environment plus its own
//! `JOB_COMPLETION_INDEX`. Tasks go through the same worker contract as a real
//! cluster worker, so the cluster dispatch path can be exercised end to end.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: no isolation, no persistence
//! - **Single-process only**: the container image is recorded but never pulled

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ulid::Ulid;

use super::{JobScheduler, JobSpec, ENV_JOB_COMPLETION_INDEX};
use crate::error::{Error, Result};
use crate::runner::RunnerFactory;
use crate::watcher::{spawn_watched, CompletionWatcher, WatcherMultiplex};
use crate::worker::{execute, WorkerEnv};

/// A job accepted by the scheduler.
#[derive(Debug, Clone)]
pub struct JobRecord {
    /// Scheduler-assigned job id.
    pub job_id: String,
    /// Job name derived from the spec.
    pub job_name: String,
    /// The submitted job.
    pub spec: JobSpec,
    /// When the job was accepted.
    pub submitted_at: DateTime<Utc>,
}

fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("job scheduler lock poisoned")
}

/// Runs cluster jobs in-process.
pub struct InMemoryJobScheduler {
    factory: RunnerFactory,
    jobs: RwLock<Vec<JobRecord>>,
}

impl std::fmt::Debug for InMemoryJobScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryJobScheduler")
            .field("jobs", &self.len())
            .finish_non_exhaustive()
    }
}

impl InMemoryJobScheduler {
    /// Creates a scheduler whose tasks build runners with `factory`.
    #[must_use]
    pub fn new(factory: RunnerFactory) -> Self {
        Self {
            factory,
            jobs: RwLock::new(Vec::new()),
        }
    }

    /// Returns the jobs submitted so far, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the lock is poisoned.
    pub fn jobs(&self) -> Result<Vec<JobRecord>> {
        Ok(self.jobs.read().map_err(poison_err)?.clone())
    }

    /// Removes and returns all recorded jobs.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the lock is poisoned.
    pub fn drain(&self) -> Result<Vec<JobRecord>> {
        Ok(std::mem::take(&mut *self.jobs.write().map_err(poison_err)?))
    }

    /// Returns the number of recorded jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.read().map(|jobs| jobs.len()).unwrap_or(0)
    }

    /// Returns true if no jobs are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl JobScheduler for InMemoryJobScheduler {
    async fn submit(&self, job: JobSpec) -> Result<Arc<dyn CompletionWatcher>> {
        let record = JobRecord {
            job_id: Ulid::new().to_string(),
            job_name: job.job_name(),
            spec: job,
            submitted_at: Utc::now(),
        };
        tracing::info!(
            job_id = %record.job_id,
            job = %record.job_name,
            tasks = record.spec.num_tasks,
            "accepted job"
        );

        let mut watchers: Vec<Arc<dyn CompletionWatcher>> = Vec::new();
        for task in 0..record.spec.num_tasks {
            let mut env_vars: BTreeMap<String, String> = record.spec.env_vars.clone();
            env_vars.insert(ENV_JOB_COMPLETION_INDEX.to_string(), task.to_string());
            let env = WorkerEnv::from_env_with(|key| env_vars.get(key).cloned())?;
            let factory = self.factory.clone();
            let description = format!("{} task {task}", record.job_name);
            watchers.push(spawn_watched(description, async move {
                execute(&factory, &env).await
            }));
        }

        self.jobs.write().map_err(poison_err)?.push(record);
        Ok(Arc::new(WatcherMultiplex::new(watchers)))
    }
}
