//! Runner registry.
//!
//! A [`Runner`] is a unit of materialization work reconstructed from a
//! serialized payload. [`RunnerFactory`] rebuilds the stores a payload names
//! through the [`ProviderRegistry`] and instantiates the runner, so the same
//! payload works in the process that created it and in a worker process that
//! shares nothing with it.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use fstore_core::ResourceId;
use fstore_provider::ProviderRegistry;

use crate::config::{ChunkRunnerConfig, DispatchConfig, JobCloud, MaterializeRunnerConfig};
use crate::copy::CopyToOnlineRunner;
use crate::dispatch::cluster::ClusterDispatcher;
use crate::dispatch::local::LocalDispatcher;
use crate::dispatch::{ChunkDispatcher, JobScheduler};
use crate::error::{Error, Result};
use crate::materialize::MaterializeRunner;
use crate::metrics::RunnerMetrics;
use crate::watcher::CompletionWatcher;

/// A unit of work that runs asynchronously behind a watcher.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Starts the work and returns a watcher over it.
    ///
    /// # Errors
    ///
    /// Returns an error for failures that happen before the work is handed
    /// off. Later failures are reported through the watcher.
    async fn run(&self) -> Result<Arc<dyn CompletionWatcher>>;

    /// Returns the resource this runner works on.
    fn resource(&self) -> &ResourceId;

    /// Returns true if this runner refreshes existing state.
    fn is_update_job(&self) -> bool;
}

/// Kinds of runner the factory can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunnerKind {
    /// Materialization orchestrator.
    Materialize,
    /// Chunk copy into an online table.
    CopyToOnline,
}

impl RunnerKind {
    /// Returns the wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Materialize => "MATERIALIZE",
            Self::CopyToOnline => "COPY_TO_ONLINE",
        }
    }
}

impl fmt::Display for RunnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunnerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "MATERIALIZE" => Ok(Self::Materialize),
            "COPY_TO_ONLINE" => Ok(Self::CopyToOnline),
            other => Err(Error::UnknownRunner {
                kind: other.to_string(),
            }),
        }
    }
}

/// Builds runners from serialized payloads.
///
/// Cheap to clone; clones share the provider registry and scheduler.
#[derive(Clone)]
pub struct RunnerFactory {
    registry: Arc<ProviderRegistry>,
    dispatch: DispatchConfig,
    scheduler: Option<Arc<dyn JobScheduler>>,
    metrics: RunnerMetrics,
}

impl fmt::Debug for RunnerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerFactory")
            .field("registry", &self.registry)
            .field("dispatch", &self.dispatch)
            .field("has_scheduler", &self.scheduler.is_some())
            .finish()
    }
}

impl RunnerFactory {
    /// Creates a factory without a cluster scheduler.
    #[must_use]
    pub fn new(registry: Arc<ProviderRegistry>, dispatch: DispatchConfig) -> Self {
        Self {
            registry,
            dispatch,
            scheduler: None,
            metrics: RunnerMetrics::new(),
        }
    }

    /// Sets the scheduler used for [`JobCloud::Kubernetes`] runs.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: Arc<dyn JobScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Returns the provider registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Returns the dispatch configuration.
    #[must_use]
    pub fn dispatch_config(&self) -> &DispatchConfig {
        &self.dispatch
    }

    /// Builds a runner of `kind` from its serialized payload.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the payload does not decode, or the
    /// error raised while rebuilding its stores.
    pub fn create(&self, kind: RunnerKind, config: &[u8]) -> Result<Box<dyn Runner>> {
        match kind {
            RunnerKind::Materialize => {
                let config = MaterializeRunnerConfig::deserialize(config)?;
                Ok(Box::new(self.materialize_runner(&config)?))
            }
            RunnerKind::CopyToOnline => {
                let config = ChunkRunnerConfig::deserialize(config)?;
                Ok(Box::new(self.copy_runner(config)?))
            }
        }
    }

    /// Builds a runner from its wire kind name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRunner`] for an unregistered kind, otherwise
    /// see [`RunnerFactory::create`].
    pub fn create_named(&self, kind: &str, config: &[u8]) -> Result<Box<dyn Runner>> {
        self.create(kind.parse()?, config)
    }

    /// Builds a materialization orchestrator.
    ///
    /// # Errors
    ///
    /// Returns a provider error if either store cannot be built, or a
    /// configuration error if cluster dispatch is requested without a
    /// scheduler.
    pub fn materialize_runner(&self, config: &MaterializeRunnerConfig) -> Result<MaterializeRunner> {
        let online = self
            .registry
            .online_store(&config.online_type, &config.online_config)
            .inspect_err(|e| tracing::error!(error = %e, "failed to configure online provider"))?;
        let offline = self
            .registry
            .offline_store(&config.offline_type, &config.offline_config)
            .inspect_err(|e| tracing::error!(error = %e, "failed to configure offline provider"))?;

        let dispatcher: Arc<dyn ChunkDispatcher> = match config.cloud {
            JobCloud::Local => Arc::new(LocalDispatcher::new(self.clone())),
            JobCloud::Kubernetes => {
                let scheduler = self.scheduler.clone().ok_or_else(|| {
                    Error::configuration("cluster dispatch requires a job scheduler")
                })?;
                Arc::new(ClusterDispatcher::new(scheduler, self.dispatch.clone()))
            }
        };

        Ok(MaterializeRunner::new(
            online,
            offline,
            config.resource_id.clone(),
            config.value_type,
            dispatcher,
        )
        .with_update(config.is_update)
        .with_max_chunk_rows(self.dispatch.max_chunk_rows))
    }

    /// Builds a chunk-copy worker.
    ///
    /// # Errors
    ///
    /// Returns a provider error if either store cannot be built.
    pub fn copy_runner(&self, config: ChunkRunnerConfig) -> Result<CopyToOnlineRunner> {
        let online = self
            .registry
            .online_store(&config.online_type, &config.online_config)
            .inspect_err(|e| tracing::error!(error = %e, "failed to configure online provider"))?;
        let offline = self
            .registry
            .offline_store(&config.offline_type, &config.offline_config)
            .inspect_err(|e| tracing::error!(error = %e, "failed to configure offline provider"))?;
        Ok(CopyToOnlineRunner::new(online, offline, config).with_metrics(self.metrics))
    }
}
