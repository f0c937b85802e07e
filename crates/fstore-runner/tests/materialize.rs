//! End-to-end materialization through the runner factory.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use fstore_core::{ProviderType, ResourceId, ScalarType, SerializedConfig, Value, ValueType, VectorType};
use fstore_runner::config::{DispatchConfig, JobCloud, MaterializeRunnerConfig};
use fstore_runner::{CompletionWatcher, Error, Runner, RunnerFactory, RunnerKind};
use fstore_provider::FeatureRow;
use fstore_test_utils::{
    base_ts, entity_name, float32_rows, init_test_logging, rows_with, TestContext, FAILING_ONLINE,
};

fn avg_txn() -> ResourceId {
    ResourceId::feature("avg_txn", "v1")
}

fn materialize_config(
    ctx: &TestContext,
    online_type: ProviderType,
    online_config: SerializedConfig,
    value_type: ValueType,
) -> MaterializeRunnerConfig {
    MaterializeRunnerConfig {
        online_type,
        offline_type: ProviderType::MEMORY_OFFLINE,
        online_config,
        offline_config: ctx.memory_config(),
        resource_id: avg_txn(),
        value_type,
        cloud: JobCloud::Local,
        is_update: false,
    }
}

fn factory(ctx: &TestContext, max_chunk_rows: u64) -> RunnerFactory {
    RunnerFactory::new(
        Arc::clone(&ctx.registry),
        DispatchConfig::default().with_max_chunk_rows(max_chunk_rows),
    )
}

async fn wait_all_complete(watcher: &dyn CompletionWatcher) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !watcher.complete() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("watcher completes");
}

#[tokio::test]
async fn avg_txn_single_chunk_local() {
    init_test_logging();
    let ctx = TestContext::new();
    ctx.seed(&avg_txn(), float32_rows(9));

    let config = materialize_config(
        &ctx,
        ProviderType::LOCAL_ONLINE,
        ctx.memory_config(),
        ValueType::Scalar(ScalarType::Float32),
    );
    let runner = factory(&ctx, fstore_runner::MAX_CHUNK_ROWS)
        .create(RunnerKind::Materialize, &config.serialize().unwrap())
        .unwrap();
    assert_eq!(runner.resource(), &avg_txn());
    assert!(!runner.is_update_job());

    let watcher = runner.run().await.unwrap();
    watcher.wait().await.unwrap();
    assert!(watcher.complete());
    assert!(watcher.err().is_none());

    let table = ctx
        .online_store(&ProviderType::LOCAL_ONLINE, &ctx.memory_config())
        .get_table("avg_txn", "v1")
        .await
        .unwrap();
    assert_eq!(table.value_type(), ValueType::Scalar(ScalarType::Float32));
    for i in 0..9 {
        #[allow(clippy::cast_precision_loss)]
        let expected = Value::Float32(i as f32 * 0.5);
        assert_eq!(table.get(&entity_name(i)).await.unwrap(), expected);
    }
    assert!(table.get(&entity_name(9)).await.is_err());
}

#[tokio::test]
async fn many_chunks_write_every_row_once() {
    let ctx = TestContext::new();
    ctx.seed(&avg_txn(), rows_with(25, |i| Value::Int(i64::try_from(i).unwrap())));

    let config = materialize_config(
        &ctx,
        ProviderType::LOCAL_ONLINE,
        ctx.memory_config(),
        ValueType::Scalar(ScalarType::Int64),
    );
    let runner = factory(&ctx, 4).materialize_runner(&config).unwrap();
    let watcher = runner.run().await.unwrap();
    watcher.wait().await.unwrap();

    let table = ctx
        .online_store(&ProviderType::LOCAL_ONLINE, &ctx.memory_config())
        .get_table("avg_txn", "v1")
        .await
        .unwrap();
    for i in 0..25 {
        assert_eq!(
            table.get(&entity_name(i)).await.unwrap(),
            Value::Int64(i64::try_from(i).unwrap())
        );
    }
}

#[tokio::test]
async fn latest_value_per_entity_is_materialized() {
    let ctx = TestContext::new();
    let mut rows = float32_rows(3);
    let mut newer = float32_rows(1);
    newer[0].value = Value::Float32(42.0);
    newer[0].ts = rows[2].ts + chrono::Duration::hours(1);
    rows.append(&mut newer);
    ctx.seed(&avg_txn(), rows);

    let config = materialize_config(
        &ctx,
        ProviderType::LOCAL_ONLINE,
        ctx.memory_config(),
        ValueType::Scalar(ScalarType::Float32),
    );
    let runner = factory(&ctx, 2).materialize_runner(&config).unwrap();
    runner.run().await.unwrap().wait().await.unwrap();

    let table = ctx
        .online_store(&ProviderType::LOCAL_ONLINE, &ctx.memory_config())
        .get_table("avg_txn", "v1")
        .await
        .unwrap();
    assert_eq!(table.get(&entity_name(0)).await.unwrap(), Value::Float32(42.0));
}

#[tokio::test]
async fn empty_materialization_still_creates_table() {
    let ctx = TestContext::new();
    ctx.seed(&avg_txn(), Vec::new());

    let config = materialize_config(
        &ctx,
        ProviderType::LOCAL_ONLINE,
        ctx.memory_config(),
        ValueType::Scalar(ScalarType::Float32),
    );
    let runner = factory(&ctx, fstore_runner::MAX_CHUNK_ROWS)
        .materialize_runner(&config)
        .unwrap();
    runner.run().await.unwrap().wait().await.unwrap();

    assert!(ctx
        .online_store(&ProviderType::LOCAL_ONLINE, &ctx.memory_config())
        .get_table("avg_txn", "v1")
        .await
        .is_ok());
}

#[tokio::test]
async fn one_failing_chunk_fails_the_run_but_others_finish() {
    let ctx = TestContext::new();
    ctx.seed(&avg_txn(), float32_rows(12));

    // Entity 5 lives in the second of three chunks.
    let online_config = ctx.failing_config([entity_name(5)]);
    let config = materialize_config(
        &ctx,
        FAILING_ONLINE,
        online_config.clone(),
        ValueType::Scalar(ScalarType::Float32),
    );
    let runner = factory(&ctx, 4).materialize_runner(&config).unwrap();
    let watcher = runner.run().await.unwrap();

    let err = watcher.wait().await.unwrap_err();
    assert!(err.to_string().starts_with("cloud watch: "), "{err}");
    assert!(matches!(
        err.provider_error(),
        Some(fstore_provider::Error::Storage { .. })
    ));
    wait_all_complete(watcher.as_ref()).await;
    assert!(watcher.err().is_some());

    // Rows outside the failing chunk are not rolled back.
    let table = ctx
        .online_store(&FAILING_ONLINE, &online_config)
        .get_table("avg_txn", "v1")
        .await
        .unwrap();
    for i in (0..4).chain(8..12) {
        assert!(table.get(&entity_name(i)).await.is_ok(), "entity {i}");
    }
    assert!(table.get(&entity_name(5)).await.is_err());
}

#[tokio::test]
async fn update_run_recovers_after_partial_failure() {
    let ctx = TestContext::new();
    ctx.seed(&avg_txn(), float32_rows(6));
    let value_type = ValueType::Scalar(ScalarType::Float32);

    let failing = materialize_config(
        &ctx,
        FAILING_ONLINE,
        ctx.failing_config([entity_name(2)]),
        value_type,
    );
    let runner = factory(&ctx, 3).materialize_runner(&failing).unwrap();
    assert!(runner.run().await.unwrap().wait().await.is_err());

    let healthy_config = ctx.failing_config(Vec::<String>::new());
    let mut retry = materialize_config(&ctx, FAILING_ONLINE, healthy_config.clone(), value_type);

    // A fresh run collides with the snapshot from the failed attempt.
    let err = factory(&ctx, 3)
        .materialize_runner(&retry)
        .unwrap()
        .run()
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err.provider_error(),
        Some(fstore_provider::Error::MaterializationAlreadyExists { .. })
    ));

    retry.is_update = true;
    let runner = factory(&ctx, 3).materialize_runner(&retry).unwrap();
    assert!(runner.is_update_job());
    runner.run().await.unwrap().wait().await.unwrap();

    let table = ctx
        .online_store(&FAILING_ONLINE, &healthy_config)
        .get_table("avg_txn", "v1")
        .await
        .unwrap();
    for i in 0..6 {
        assert!(table.get(&entity_name(i)).await.is_ok(), "entity {i}");
    }
}

#[tokio::test]
async fn existing_table_is_fatal_on_new_run() {
    let ctx = TestContext::new();
    ctx.seed(&avg_txn(), float32_rows(3));
    let value_type = ValueType::Scalar(ScalarType::Float32);
    let store = ctx.online_store(&ProviderType::LOCAL_ONLINE, &ctx.memory_config());
    let table = store.create_table("avg_txn", "v1", &value_type).await.unwrap();
    table.set("stale", Value::Float32(1.0)).await.unwrap();

    let config = materialize_config(&ctx, ProviderType::LOCAL_ONLINE, ctx.memory_config(), value_type);
    let err = factory(&ctx, 4)
        .materialize_runner(&config)
        .unwrap()
        .run()
        .await
        .err()
        .unwrap();
    assert!(matches!(err, Error::TableExistsOnNewRun { .. }));
    assert!(table.get(&entity_name(0)).await.is_err());
}

#[tokio::test]
async fn embedding_requires_vector_store() {
    let ctx = TestContext::new();
    ctx.seed(&avg_txn(), Vec::new());

    let config = materialize_config(
        &ctx,
        ProviderType::LOCAL_ONLINE,
        ctx.memory_config(),
        ValueType::Vector(VectorType::embedding(3)),
    );
    let err = factory(&ctx, 4)
        .materialize_runner(&config)
        .unwrap()
        .run()
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err.provider_error(),
        Some(fstore_provider::Error::UnsupportedCapability { .. })
    ));
    assert!(ctx
        .online_store(&ProviderType::LOCAL_ONLINE, &ctx.memory_config())
        .get_table("avg_txn", "v1")
        .await
        .is_err());
}

#[tokio::test]
async fn embeddings_are_indexed_and_searchable() {
    let ctx = TestContext::new();
    let vectors = [
        ("a", vec![0.0, 0.0, 0.0]),
        ("b", vec![10.0, 10.0, 10.0]),
        ("c", vec![1.0, 1.0, 1.0]),
    ];
    ctx.seed(
        &avg_txn(),
        vectors.iter().map(|(entity, v)| {
            fstore_provider::FeatureRow::new(*entity, Value::Vector(v.clone()), fstore_test_utils::base_ts())
        }),
    );

    let config = materialize_config(
        &ctx,
        ProviderType::VECTOR_MEMORY_ONLINE,
        ctx.memory_config(),
        ValueType::Vector(VectorType::embedding(3)),
    );
    let runner = factory(&ctx, 2).materialize_runner(&config).unwrap();
    runner.run().await.unwrap().wait().await.unwrap();

    let store = ctx.online_store(&ProviderType::VECTOR_MEMORY_ONLINE, &ctx.memory_config());
    let table = store
        .as_vector_store()
        .unwrap()
        .get_vector_table("avg_txn", "v1")
        .await
        .unwrap();
    assert_eq!(table.nearest(&[0.2, 0.2, 0.2], 2).await.unwrap(), vec!["a", "c"]);
    assert_eq!(table.nearest(&[9.0, 9.0, 9.0], 10).await.unwrap().len(), 3);
}

#[tokio::test]
async fn blob_backend_round_trips_through_json() {
    let ctx = TestContext::new();
    let dir = tempfile::tempdir().unwrap();
    ctx.seed(&avg_txn(), rows_with(5, |i| Value::Int(i64::try_from(i).unwrap())));

    let online_config = {
        use fstore_core::ProviderConfig;
        fstore_provider::config::BlobConfig::local_fs(dir.path())
            .serialize_config()
            .unwrap()
    };
    let config = materialize_config(
        &ctx,
        ProviderType::BLOB_ONLINE,
        online_config.clone(),
        ValueType::Scalar(ScalarType::Float64),
    );
    let runner = factory(&ctx, 2).materialize_runner(&config).unwrap();
    runner.run().await.unwrap().wait().await.unwrap();

    let table = ctx
        .online_store(&ProviderType::BLOB_ONLINE, &online_config)
        .get_table("avg_txn", "v1")
        .await
        .unwrap();
    assert_eq!(table.get(&entity_name(4)).await.unwrap(), Value::Float64(4.0));
}

#[tokio::test]
async fn blob_backend_on_disk_copies_every_chunk() {
    let ctx = TestContext::new();
    let dir = tempfile::tempdir().unwrap();
    // Dotted names share a stem once the extension is dropped.
    ctx.seed(
        &avg_txn(),
        (0..12_i64).map(|i| FeatureRow::new(format!("a.{i}"), Value::Int64(i * 10), base_ts())),
    );

    let online_config = {
        use fstore_core::ProviderConfig;
        fstore_provider::config::BlobConfig::local_fs(dir.path())
            .serialize_config()
            .unwrap()
    };
    let config = materialize_config(
        &ctx,
        ProviderType::BLOB_ONLINE,
        online_config.clone(),
        ValueType::Scalar(ScalarType::Int64),
    );
    let runner = factory(&ctx, 5).materialize_runner(&config).unwrap();
    runner.run().await.unwrap().wait().await.unwrap();

    let table = ctx
        .online_store(&ProviderType::BLOB_ONLINE, &online_config)
        .get_table("avg_txn", "v1")
        .await
        .unwrap();
    for i in 0..12_i64 {
        assert_eq!(table.get(&format!("a.{i}")).await.unwrap(), Value::Int64(i * 10), "a.{i}");
    }
}

#[tokio::test]
async fn missing_offline_dataset_fails_synchronously() {
    let ctx = TestContext::new();
    let config = materialize_config(
        &ctx,
        ProviderType::LOCAL_ONLINE,
        ctx.memory_config(),
        ValueType::Scalar(ScalarType::Float32),
    );
    let err = factory(&ctx, 4)
        .materialize_runner(&config)
        .unwrap()
        .run()
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err.provider_error(),
        Some(fstore_provider::Error::DatasetNotFound { .. })
    ));
}

#[tokio::test]
async fn cluster_runs_need_a_scheduler() {
    let ctx = TestContext::new();
    let mut config = materialize_config(
        &ctx,
        ProviderType::LOCAL_ONLINE,
        ctx.memory_config(),
        ValueType::Scalar(ScalarType::Float32),
    );
    config.cloud = JobCloud::Kubernetes;
    let err = factory(&ctx, 4).materialize_runner(&config).unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }));
}
