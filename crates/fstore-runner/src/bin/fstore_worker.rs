//! fstore chunk worker.
//!
//! Entry point for cluster tasks: reads `NAME`, `CONFIG` and
//! `JOB_COMPLETION_INDEX`, rebuilds both stores, copies one chunk and exits.
//! A failed copy exits non-zero so the scheduler records the task as failed.

use std::sync::Arc;

use fstore_core::observability::{init_logging, LogFormat};
use fstore_provider::ProviderRegistry;
use fstore_runner::config::DispatchConfig;
use fstore_runner::error::Result;
use fstore_runner::worker::{execute, WorkerEnv};
use fstore_runner::RunnerFactory;

fn log_format_from_env() -> Result<LogFormat> {
    match std::env::var("FSTORE_LOG_FORMAT") {
        Ok(value) => Ok(value.parse()?),
        Err(_) => Ok(LogFormat::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(log_format_from_env()?);

    let env = WorkerEnv::from_env()?;
    let factory = RunnerFactory::new(
        Arc::new(ProviderRegistry::with_defaults()),
        DispatchConfig::from_env()?,
    );

    if let Err(err) = execute(&factory, &env).await {
        tracing::error!(kind = %env.kind, task = ?env.task_index, error = %err, "worker failed");
        return Err(err);
    }
    Ok(())
}
