//! Shared test utilities for fstore integration tests.
//!
//! This crate provides:
//! - [`TestContext`]: a provider registry with a seedable offline store and
//!   unique namespaces per test
//! - [`FailingOnlineStore`]: an online store that rejects writes for chosen
//!   entities, registered as [`FAILING_ONLINE`]
//! - Row fixtures for seeding offline datasets
//!
//! # Example
//!
//! ```rust,ignore
//! use fstore_test_utils::{float32_rows, TestContext};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let ctx = TestContext::new();
//!     ctx.seed(&ResourceId::feature("avg_txn", "v1"), float32_rows(9));
//!     // ... build a runner from ctx.registry ...
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod failing;
pub mod fixtures;

pub use failing::*;
pub use fixtures::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("fstore=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
