//! Worker process contract.
//!
//! A worker learns what to do entirely from its environment:
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `NAME` | runner kind, e.g. `COPY_TO_ONLINE` |
//! | `CONFIG` | serialized runner payload |
//! | `JOB_COMPLETION_INDEX` | task position; selects the chunk for `COPY_TO_ONLINE` |
//!
//! [`execute`] rebuilds the runner through a [`RunnerFactory`], runs it and
//! waits for its terminal outcome.

use crate::config::ChunkRunnerConfig;
use crate::dispatch::{ENV_CONFIG, ENV_JOB_COMPLETION_INDEX, ENV_NAME};
use crate::error::{Error, Result};
use crate::runner::{Runner, RunnerFactory, RunnerKind};

/// Parsed worker environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerEnv {
    /// Runner kind to build.
    pub kind: RunnerKind,
    /// Serialized runner payload.
    pub config: Vec<u8>,
    /// Task position within the job, if the scheduler provides one.
    pub task_index: Option<u64>,
}

impl WorkerEnv {
    /// Reads the worker environment of this process.
    ///
    /// # Errors
    ///
    /// See [`WorkerEnv::from_env_with`].
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Reads the worker environment from a custom source.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `NAME` or `CONFIG` is missing or
    /// `JOB_COMPLETION_INDEX` is not an integer, and [`Error::UnknownRunner`]
    /// for an unknown kind.
    pub fn from_env_with<F>(get_env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            get_env(key)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| Error::configuration(format!("missing {key}")))
        };
        let kind: RunnerKind = required(ENV_NAME)?.parse()?;
        let config = required(ENV_CONFIG)?.into_bytes();
        let task_index = get_env(ENV_JOB_COMPLETION_INDEX)
            .map(|raw| {
                raw.trim().parse::<u64>().map_err(|_| {
                    Error::configuration(format!(
                        "{ENV_JOB_COMPLETION_INDEX} must be a non-negative integer, got '{raw}'"
                    ))
                })
            })
            .transpose()?;
        Ok(Self {
            kind,
            config,
            task_index,
        })
    }
}

/// Builds the runner described by `env`.
///
/// For `COPY_TO_ONLINE`, the task index replaces the payload's chunk index.
///
/// # Errors
///
/// Returns the factory's error if the payload does not decode or its stores
/// cannot be built.
pub fn build_runner(factory: &RunnerFactory, env: &WorkerEnv) -> Result<Box<dyn Runner>> {
    match (env.kind, env.task_index) {
        (RunnerKind::CopyToOnline, Some(index)) => {
            let config = ChunkRunnerConfig::deserialize(&env.config)?.for_chunk(index);
            Ok(Box::new(factory.copy_runner(config)?))
        }
        (kind, _) => factory.create(kind, &env.config),
    }
}

/// Runs the worker described by `env` to completion.
///
/// # Errors
///
/// Returns the runner's error, or its terminal watcher error.
pub async fn execute(factory: &RunnerFactory, env: &WorkerEnv) -> Result<()> {
    tracing::info!(kind = %env.kind, task = ?env.task_index, "starting worker");
    let runner = build_runner(factory, env)?;
    let watcher = runner.run().await?;
    watcher
        .wait()
        .await
        .map_err(|err| Error::watch(format!("{} worker", env.kind), err))?;
    tracing::info!(kind = %env.kind, task = ?env.task_index, "worker finished");
    Ok(())
}
