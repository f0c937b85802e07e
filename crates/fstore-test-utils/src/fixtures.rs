//! Pre-built test fixtures for common test scenarios.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use ulid::Ulid;

use fstore_core::{ProviderConfig, ProviderType, ResourceId, SerializedConfig, Value};
use fstore_provider::backends::MemoryOfflineStore;
use fstore_provider::config::MemoryConfig;
use fstore_provider::{FeatureRow, OnlineStore, Provider, ProviderRegistry, Result};

use crate::failing::{failing_factory, FailingConfig, FAILING_ONLINE};

/// Test context: a registry whose offline store the test can seed directly.
///
/// Every context gets its own namespace, so in-process stores never leak
/// between tests.
pub struct TestContext {
    /// Registry with the built-in backends plus [`FAILING_ONLINE`].
    pub registry: Arc<ProviderRegistry>,
    /// The offline store every `MEMORY_OFFLINE` config resolves to.
    pub offline: Arc<MemoryOfflineStore>,
    /// Namespace used by this context's configs.
    pub namespace: String,
}

impl TestContext {
    /// Creates a context with a unique namespace.
    #[must_use]
    pub fn new() -> Self {
        let namespace = format!("test-{}", Ulid::new().to_string().to_lowercase());
        let registry = ProviderRegistry::with_defaults();
        let offline = Arc::new(MemoryOfflineStore::new(MemoryConfig::new(namespace.clone())));

        let shared = Arc::clone(&offline);
        registry
            .register(
                ProviderType::MEMORY_OFFLINE,
                move |_: &SerializedConfig| -> Result<Provider> {
                    Ok(Provider::Offline(shared.clone()))
                },
            )
            .expect("register offline store");
        registry
            .register(FAILING_ONLINE, failing_factory())
            .expect("register failing store");

        Self {
            registry: Arc::new(registry),
            offline,
            namespace,
        }
    }

    /// Appends source rows for `id` to the offline store.
    pub fn seed(&self, id: &ResourceId, rows: impl IntoIterator<Item = FeatureRow>) {
        self.offline.insert_rows(id, rows).expect("seed offline rows");
    }

    /// Returns the serialized in-process config for this context's namespace.
    #[must_use]
    pub fn memory_config(&self) -> SerializedConfig {
        MemoryConfig::new(self.namespace.clone())
            .serialize_config()
            .expect("serialize memory config")
    }

    /// Returns a [`FAILING_ONLINE`] config that fails writes to `entities`.
    #[must_use]
    pub fn failing_config<I, S>(&self, entities: I) -> SerializedConfig
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FailingConfig::new(self.namespace.clone(), entities)
            .serialize_config()
            .expect("serialize failing config")
    }

    /// Builds an online store through the registry.
    #[must_use]
    pub fn online_store(
        &self,
        provider_type: &ProviderType,
        config: &SerializedConfig,
    ) -> Arc<dyn OnlineStore> {
        self.registry
            .online_store(provider_type, config)
            .expect("build online store")
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed base timestamp for fixture rows.
#[must_use]
pub fn base_ts() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).single().expect("valid timestamp")
}

/// Builds `n` rows for entities [`entity_name`]`(0..n)`, one second apart, with values from `value`.
pub fn rows_with<F>(n: usize, value: F) -> Vec<FeatureRow>
where
    F: Fn(usize) -> Value,
{
    (0..n)
        .map(|i| {
            let offset = Duration::seconds(i64::try_from(i).expect("row index fits i64"));
            FeatureRow::new(entity_name(i), value(i), base_ts() + offset)
        })
        .collect()
}

/// Builds `n` rows of float32 values `i * 0.5`.
#[allow(clippy::cast_precision_loss)]
pub fn float32_rows(n: usize) -> Vec<FeatureRow> {
    rows_with(n, |i| Value::Float32(i as f32 * 0.5))
}

/// Returns the entity name used by the row fixtures.
#[must_use]
pub fn entity_name(i: usize) -> String {
    format!("entity_{i:05}")
}
