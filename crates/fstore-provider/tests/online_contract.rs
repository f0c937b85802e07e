//! Contract tests run against every built-in online backend.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use fstore_core::{ProviderConfig, ProviderType, ScalarType, SerializedConfig, Value, ValueType, VectorType};
use fstore_provider::config::{BlobConfig, MemoryConfig};
use fstore_provider::{Error, OnlineStore, ProviderRegistry};

struct Backend {
    provider_type: ProviderType,
    config: SerializedConfig,
    _dir: Option<tempfile::TempDir>,
}

fn backends() -> Vec<Backend> {
    let dir = tempfile::tempdir().unwrap();
    let fs_config = BlobConfig::local_fs(dir.path())
        .with_prefix("features")
        .serialize_config()
        .unwrap();
    vec![
        Backend {
            provider_type: ProviderType::LOCAL_ONLINE,
            config: MemoryConfig::new("contract").serialize_config().unwrap(),
            _dir: None,
        },
        Backend {
            provider_type: ProviderType::VECTOR_MEMORY_ONLINE,
            config: MemoryConfig::new("contract").serialize_config().unwrap(),
            _dir: None,
        },
        Backend {
            provider_type: ProviderType::BLOB_ONLINE,
            config: BlobConfig::memory("contract").serialize_config().unwrap(),
            _dir: None,
        },
        Backend {
            provider_type: ProviderType::BLOB_ONLINE,
            config: fs_config,
            _dir: Some(dir),
        },
    ]
}

fn stores() -> Vec<(Arc<dyn OnlineStore>, Backend)> {
    let registry = ProviderRegistry::with_defaults();
    backends()
        .into_iter()
        .map(|backend| {
            let store = registry
                .online_store(&backend.provider_type, &backend.config)
                .unwrap();
            (store, backend)
        })
        .collect()
}

#[tokio::test]
async fn create_and_get_table() {
    for (store, backend) in stores() {
        let ty = ValueType::Scalar(ScalarType::String);
        store.create_table("create", "v", &ty).await.unwrap();
        let table = store.get_table("create", "v").await.unwrap();
        assert_eq!(table.value_type(), ty, "{}", backend.provider_type);
        assert_eq!(store.provider_type(), backend.provider_type);
    }
}

#[tokio::test]
async fn table_already_exists() {
    for (store, backend) in stores() {
        let ty = ValueType::Scalar(ScalarType::String);
        store.create_table("dup", "v", &ty).await.unwrap();
        let err = store.create_table("dup", "v", &ty).await.err().unwrap();
        assert!(
            matches!(err, Error::TableAlreadyExists { .. }),
            "{}: {err}",
            backend.provider_type
        );
        assert!(!err.to_string().is_empty());
    }
}

#[tokio::test]
async fn table_not_found() {
    for (store, backend) in stores() {
        let err = store.get_table("missing", "v").await.err().unwrap();
        assert!(
            matches!(err, Error::TableNotFound { .. }),
            "{}: {err}",
            backend.provider_type
        );
        assert!(!err.to_string().is_empty());
    }
}

#[tokio::test]
async fn set_get_entity() {
    for (store, _) in stores() {
        let table = store
            .create_table("setget", "v", &ValueType::Scalar(ScalarType::String))
            .await
            .unwrap();
        table.set("joe", Value::from("bar")).await.unwrap();
        assert_eq!(table.get("joe").await.unwrap(), Value::from("bar"));
    }
}

#[tokio::test]
async fn entity_not_found() {
    for (store, backend) in stores() {
        let table = store
            .create_table("absent", "v", &ValueType::Scalar(ScalarType::String))
            .await
            .unwrap();
        let err = table.get("nobody").await.unwrap_err();
        assert!(
            matches!(err, Error::EntityNotFound { .. }),
            "{}: {err}",
            backend.provider_type
        );
        assert!(!err.to_string().is_empty());
    }
}

#[tokio::test]
async fn mass_table_write() {
    for (store, _) in stores() {
        let ty = ValueType::Scalar(ScalarType::Int);
        for t in 0..10 {
            let table = store
                .create_table(&format!("mass_{t}"), "v", &ty)
                .await
                .unwrap();
            for e in 0..10 {
                table.set(&format!("entity_{e}"), Value::Int(1)).await.unwrap();
            }
        }
        for t in 0..10 {
            let table = store.get_table(&format!("mass_{t}"), "v").await.unwrap();
            for e in 0..10 {
                assert_eq!(table.get(&format!("entity_{e}")).await.unwrap(), Value::Int(1));
            }
        }
    }
}

#[tokio::test]
async fn type_casting() {
    let cases = vec![
        ("int", ScalarType::Int, Value::Int(1), Value::Int(1)),
        ("int64", ScalarType::Int64, Value::Int(1), Value::Int64(1)),
        ("int32", ScalarType::Int32, Value::Int(1), Value::Int32(1)),
        ("float32", ScalarType::Float32, Value::Float64(1.0), Value::Float32(1.0)),
        ("float64", ScalarType::Float64, Value::Int(1), Value::Float64(1.0)),
        ("string", ScalarType::String, Value::from("1.0"), Value::from("1.0")),
        ("bool", ScalarType::Bool, Value::Bool(false), Value::Bool(false)),
        ("float64_inf", ScalarType::Float64, Value::Float64(f64::INFINITY), Value::Float64(f64::INFINITY)),
        ("float32_neg_inf", ScalarType::Float32, Value::Float64(f64::NEG_INFINITY), Value::Float32(f32::NEG_INFINITY)),
    ];
    for (store, backend) in stores() {
        for (name, ty, written, expected) in &cases {
            let table = store
                .create_table(&format!("cast_{name}"), "v", &ValueType::Scalar(*ty))
                .await
                .unwrap();
            table.set("e", written.clone()).await.unwrap();
            assert_eq!(
                &table.get("e").await.unwrap(),
                expected,
                "{} {name}",
                backend.provider_type
            );
        }
    }
}

#[tokio::test]
async fn nan_reads_back_as_nan() {
    for (store, backend) in stores() {
        let table = store
            .create_table("nan", "v", &ValueType::Scalar(ScalarType::Float64))
            .await
            .unwrap();
        table.set("e", Value::Float64(f64::NAN)).await.unwrap();
        let value = table.get("e").await.unwrap();
        assert!(
            matches!(value, Value::Float64(v) if v.is_nan()),
            "{} returned {value:?}",
            backend.provider_type
        );
    }
}

#[tokio::test]
async fn concurrent_writers_share_a_table() {
    for (store, _) in stores() {
        let table = store
            .create_table("concurrent", "v", &ValueType::Scalar(ScalarType::Int64))
            .await
            .unwrap();
        let mut handles = Vec::new();
        for worker in 0..4_i64 {
            let table = Arc::clone(&table);
            handles.push(tokio::spawn(async move {
                for i in 0..25_i64 {
                    table
                        .set(&format!("e{}", worker * 25 + i), Value::Int(i))
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        for n in 0..100_i64 {
            assert_eq!(
                table.get(&format!("e{n}")).await.unwrap(),
                Value::Int64(n % 25)
            );
        }
    }
}

#[tokio::test]
async fn vector_capability_detection() {
    for (store, backend) in stores() {
        let supported = backend.provider_type == ProviderType::VECTOR_MEMORY_ONLINE;
        assert_eq!(store.as_vector_store().is_some(), supported);
    }
}

#[tokio::test]
async fn vector_index_get_set_and_nearest() {
    let registry = ProviderRegistry::with_defaults();
    let store = registry
        .online_store(
            &ProviderType::VECTOR_MEMORY_ONLINE,
            &MemoryConfig::new("vectors").serialize_config().unwrap(),
        )
        .unwrap();
    let vector_store = store.as_vector_store().expect("vector capability");
    let vector = VectorType::embedding(768);
    vector_store.create_index("emb", "v", &vector).await.unwrap();
    store
        .create_table("emb", "v", &ValueType::Vector(vector))
        .await
        .unwrap();

    let table = vector_store.get_vector_table("emb", "v").await.unwrap();
    let embedding = |seed: f32| (0..768).map(|i| seed + i as f32 * 0.001).collect::<Vec<f32>>();
    table.set("a", Value::Vector(embedding(0.0))).await.unwrap();
    table.set("b", Value::Vector(embedding(5.0))).await.unwrap();
    table.set("c", Value::Vector(embedding(1.0))).await.unwrap();
    assert_eq!(
        table.get("a").await.unwrap(),
        Value::Vector(embedding(0.0))
    );

    let nearest = table.nearest(&embedding(0.1), 2).await.unwrap();
    assert_eq!(nearest, vec!["a", "c"]);

    let generic = store.get_table("emb", "v").await.unwrap();
    assert!(generic.as_vector_table().is_some());
}
