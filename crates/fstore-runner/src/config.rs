//! Runner configuration.
//!
//! - [`DispatchConfig`]: process-wide dispatch settings, read once from the environment.
//! - [`MaterializeRunnerConfig`]: payload for the orchestrator runner.
//! - [`ChunkRunnerConfig`]: payload for one chunk-copy worker.
//!
//! Runner payloads are JSON. Backend connection configs travel inside them as
//! base64-encoded [`SerializedConfig`] envelopes, so a payload is fully
//! self-describing and can cross a process boundary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use fstore_core::{MaterializationId, ProviderType, ResourceId, SerializedConfig, ValueType};

use crate::chunk::MAX_CHUNK_ROWS;
use crate::error::{Error, Result};

/// Environment variable holding the chunk worker image.
pub const ENV_WORKER_IMAGE: &str = "FSTORE_WORKER_IMAGE";
/// Environment variable holding the transformation runner image.
pub const ENV_TRANSFORM_RUNNER_IMAGE: &str = "FSTORE_TRANSFORM_RUNNER_IMAGE";
/// Environment variable holding the cluster job name prefix.
pub const ENV_JOB_PREFIX: &str = "FSTORE_JOB_PREFIX";
/// Environment variable overriding the maximum rows per chunk.
pub const ENV_MAX_CHUNK_ROWS: &str = "FSTORE_MAX_CHUNK_ROWS";

const DEFAULT_WORKER_IMAGE: &str = "fstore/worker:latest";
const DEFAULT_JOB_PREFIX: &str = "materialize";

/// Dispatch settings shared by every materialization in a process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Container image that runs chunk workers.
    pub worker_image: String,
    /// Image forwarded to cluster workers for transformation jobs.
    pub transform_runner_image: Option<String>,
    /// Prefix for cluster job names.
    pub job_prefix: String,
    /// Maximum rows copied by one chunk worker.
    pub max_chunk_rows: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            worker_image: DEFAULT_WORKER_IMAGE.to_string(),
            transform_runner_image: None,
            job_prefix: DEFAULT_JOB_PREFIX.to_string(),
            max_chunk_rows: MAX_CHUNK_ROWS,
        }
    }
}

impl DispatchConfig {
    /// Loads dispatch config from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `FSTORE_MAX_CHUNK_ROWS` is not a
    /// positive integer.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Loads dispatch config with a custom environment source.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `FSTORE_MAX_CHUNK_ROWS` is not a
    /// positive integer.
    pub fn from_env_with<F>(get_env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| get_env(key).filter(|value| !value.trim().is_empty());
        Ok(Self {
            worker_image: non_empty(ENV_WORKER_IMAGE)
                .unwrap_or_else(|| DEFAULT_WORKER_IMAGE.to_string()),
            transform_runner_image: non_empty(ENV_TRANSFORM_RUNNER_IMAGE),
            job_prefix: non_empty(ENV_JOB_PREFIX).unwrap_or_else(|| DEFAULT_JOB_PREFIX.to_string()),
            max_chunk_rows: parse_positive_u64_env(&get_env, ENV_MAX_CHUNK_ROWS, MAX_CHUNK_ROWS)?,
        })
    }

    /// Sets the maximum rows per chunk.
    #[must_use]
    pub const fn with_max_chunk_rows(mut self, max_chunk_rows: u64) -> Self {
        self.max_chunk_rows = max_chunk_rows;
        self
    }
}

fn parse_positive_u64_env<F>(get_env: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = get_env(key) else {
        return Ok(default);
    };

    let parsed = raw.trim().parse::<u64>().map_err(|_| {
        Error::configuration(format!("{key} must be a positive integer, got '{raw}'"))
    })?;
    if parsed == 0 {
        return Err(Error::configuration(format!(
            "{key} must be greater than zero"
        )));
    }
    Ok(parsed)
}

/// Where a materialization's chunks execute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobCloud {
    /// Submit one cluster job with a task per chunk.
    Kubernetes,
    /// Run chunk workers as tasks in this process.
    #[default]
    Local,
}

/// Payload for the materialization orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterializeRunnerConfig {
    /// Online store type tag.
    pub online_type: ProviderType,
    /// Offline store type tag.
    pub offline_type: ProviderType,
    /// Serialized online store connection config.
    pub online_config: SerializedConfig,
    /// Serialized offline store connection config.
    pub offline_config: SerializedConfig,
    /// Resource to materialize.
    pub resource_id: ResourceId,
    /// Declared value type of the resource.
    pub value_type: ValueType,
    /// Chunk execution backend.
    pub cloud: JobCloud,
    /// True when refreshing an existing materialization.
    #[serde(default)]
    pub is_update: bool,
}

impl MaterializeRunnerConfig {
    /// Serializes the payload as JSON.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if encoding fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::serialization(e.to_string()))
    }

    /// Parses a payload produced by [`Self::serialize`].
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the payload is malformed.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            Error::serialization(format!("invalid materialize runner config: {e}"))
        })
    }
}

/// Payload for one chunk-copy worker.
///
/// Carries everything a stateless worker needs to reconnect to both stores
/// and copy its row range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRunnerConfig {
    /// Online store type tag.
    pub online_type: ProviderType,
    /// Offline store type tag.
    pub offline_type: ProviderType,
    /// Serialized online store connection config.
    pub online_config: SerializedConfig,
    /// Serialized offline store connection config.
    pub offline_config: SerializedConfig,
    /// Materialization to read.
    pub materialized_id: MaterializationId,
    /// Resource whose online table receives the rows.
    pub resource_id: ResourceId,
    /// Rows per chunk.
    pub chunk_size: u64,
    /// Chunk this worker copies. Cluster workers take it from their task position.
    #[serde(default)]
    pub chunk_index: u64,
    /// Structured log fields attached to the worker's span.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub log_fields: BTreeMap<String, String>,
}

impl ChunkRunnerConfig {
    /// Returns a copy addressed at a different chunk.
    #[must_use]
    pub fn for_chunk(&self, chunk_index: u64) -> Self {
        Self {
            chunk_index,
            ..self.clone()
        }
    }

    /// Adds a structured log field.
    #[must_use]
    pub fn with_log_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.log_fields.insert(key.into(), value.into());
        self
    }

    /// Serializes the payload as JSON.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if encoding fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::serialization(e.to_string()))
    }

    /// Parses a payload produced by [`Self::serialize`].
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the payload is malformed.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::serialization(format!("invalid chunk runner config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fstore_core::{ScalarType, VectorType};
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn chunk_config() -> ChunkRunnerConfig {
        ChunkRunnerConfig {
            online_type: ProviderType::LOCAL_ONLINE,
            offline_type: ProviderType::MEMORY_OFFLINE,
            online_config: SerializedConfig::from_bytes(b"{\"version\":1}".to_vec()),
            offline_config: SerializedConfig::from_bytes(vec![0, 159, 146, 150]),
            materialized_id: MaterializationId::for_resource(&ResourceId::feature("f", "v")),
            resource_id: ResourceId::feature("f", "v"),
            chunk_size: 16,
            chunk_index: 0,
            log_fields: BTreeMap::new(),
        }
    }

    #[test]
    fn dispatch_defaults() {
        let config = DispatchConfig::from_env_with(env(&[])).unwrap();
        assert_eq!(config, DispatchConfig::default());
        assert_eq!(config.max_chunk_rows, MAX_CHUNK_ROWS);
        assert_eq!(config.job_prefix, "materialize");
    }

    #[test]
    fn dispatch_reads_overrides() {
        let config = DispatchConfig::from_env_with(env(&[
            (ENV_WORKER_IMAGE, "registry/worker:1.2"),
            (ENV_TRANSFORM_RUNNER_IMAGE, "registry/transform:1.2"),
            (ENV_JOB_PREFIX, "mat"),
            (ENV_MAX_CHUNK_ROWS, "1000"),
        ]))
        .unwrap();
        assert_eq!(config.worker_image, "registry/worker:1.2");
        assert_eq!(
            config.transform_runner_image.as_deref(),
            Some("registry/transform:1.2")
        );
        assert_eq!(config.job_prefix, "mat");
        assert_eq!(config.max_chunk_rows, 1000);
    }

    #[test]
    fn dispatch_rejects_bad_chunk_rows() {
        for raw in ["0", "-1", "lots"] {
            let err = DispatchConfig::from_env_with(env(&[(ENV_MAX_CHUNK_ROWS, raw)])).unwrap_err();
            assert!(matches!(err, Error::Configuration { .. }), "{raw}");
            assert!(err.to_string().contains(ENV_MAX_CHUNK_ROWS));
        }
    }

    #[test]
    fn chunk_config_survives_the_wire() {
        let config = chunk_config()
            .for_chunk(3)
            .with_log_field("run", "r-1");
        let parsed = ChunkRunnerConfig::deserialize(&config.serialize().unwrap()).unwrap();
        assert_eq!(parsed, config);
        assert_eq!(parsed.chunk_index, 3);
        assert_eq!(parsed.offline_config.as_bytes(), &[0, 159, 146, 150]);
    }

    #[test]
    fn materialize_config_survives_the_wire() {
        let config = MaterializeRunnerConfig {
            online_type: ProviderType::VECTOR_MEMORY_ONLINE,
            offline_type: ProviderType::MEMORY_OFFLINE,
            online_config: SerializedConfig::from_bytes(b"a".to_vec()),
            offline_config: SerializedConfig::from_bytes(b"b".to_vec()),
            resource_id: ResourceId::feature("emb", "v1"),
            value_type: ValueType::Vector(VectorType::embedding(8)),
            cloud: JobCloud::Kubernetes,
            is_update: true,
        };
        let parsed = MaterializeRunnerConfig::deserialize(&config.serialize().unwrap()).unwrap();
        assert_eq!(parsed, config);

        let json: serde_json::Value = serde_json::from_slice(&config.serialize().unwrap()).unwrap();
        assert_eq!(json["cloud"], "KUBERNETES");
    }

    #[test]
    fn materialize_config_defaults_to_create() {
        let mut config = MaterializeRunnerConfig {
            online_type: ProviderType::LOCAL_ONLINE,
            offline_type: ProviderType::MEMORY_OFFLINE,
            online_config: SerializedConfig::default(),
            offline_config: SerializedConfig::default(),
            resource_id: ResourceId::feature("f", "v"),
            value_type: ValueType::Scalar(ScalarType::Int),
            cloud: JobCloud::Local,
            is_update: false,
        };
        let mut json: serde_json::Value =
            serde_json::from_slice(&config.serialize().unwrap()).unwrap();
        json.as_object_mut().unwrap().remove("is_update");
        let parsed = MaterializeRunnerConfig::deserialize(json.to_string().as_bytes()).unwrap();
        config.is_update = false;
        assert_eq!(parsed, config);
    }

    #[test]
    fn malformed_payload_is_serialization_error() {
        let err = ChunkRunnerConfig::deserialize(b"not json").unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }));
    }
}
