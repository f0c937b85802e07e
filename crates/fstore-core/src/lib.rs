//! # fstore-core
//!
//! Shared primitives for the fstore materialization engine.
//!
//! - **Identifiers**: [`ResourceId`], [`ResourceType`], [`MaterializationId`]
//! - **Values**: declared [`ValueType`]s and the [`Value`] coercion contract
//! - **Provider configs**: [`ProviderType`] tags and versioned [`SerializedConfig`] payloads
//! - **Error Types**: shared error definitions and result types
//! - **Observability**: logging initialization and span helpers
//!
//! ## Example
//!
//! ```rust
//! use fstore_core::prelude::*;
//!
//! let feature = ResourceId::feature("avg_txn", "v1");
//! let declared = ValueType::Scalar(ScalarType::Float32);
//! let value = Value::Int(3).coerce(&declared)?;
//! assert_eq!(value, Value::Float32(3.0));
//! # let _ = feature;
//! # Ok::<(), fstore_core::Error>(())
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod id;
pub mod observability;
pub mod provider_config;
pub mod value;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::id::{MaterializationId, ResourceId, ResourceType};
    pub use crate::provider_config::{ProviderConfig, ProviderType, SerializedConfig};
    pub use crate::value::{ScalarType, Value, ValueType, VectorType};
}

pub use error::{Error, Result};
pub use id::{MaterializationId, ResourceId, ResourceType};
pub use observability::{init_logging, LogFormat};
pub use provider_config::{ProviderConfig, ProviderType, SerializedConfig, CONFIG_VERSION};
pub use value::{ScalarType, Value, ValueType, VectorType};
