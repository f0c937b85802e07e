//! Materialization metrics.
//!
//! Metrics go through the `metrics` crate facade; installing an exporter is
//! the embedding process's job. Without a recorder every call is a no-op.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `fstore_materializations_total` | Counter | `mode` |
//! | `fstore_chunks_dispatched_total` | Counter | `backend` |
//! | `fstore_rows_written_total` | Counter | - |
//! | `fstore_chunk_failures_total` | Counter | - |
//! | `fstore_chunk_duration_seconds` | Histogram | `result` |

use std::time::{Duration, Instant};

use metrics::{counter, histogram};

/// Metric names.
pub mod names {
    /// Counter: materialization runs started.
    pub const MATERIALIZATIONS_TOTAL: &str = "fstore_materializations_total";
    /// Counter: chunks handed to a dispatch backend.
    pub const CHUNKS_DISPATCHED_TOTAL: &str = "fstore_chunks_dispatched_total";
    /// Counter: rows written into online tables.
    pub const ROWS_WRITTEN_TOTAL: &str = "fstore_rows_written_total";
    /// Counter: chunk workers that finished with an error.
    pub const CHUNK_FAILURES_TOTAL: &str = "fstore_chunk_failures_total";
    /// Histogram: chunk copy duration in seconds.
    pub const CHUNK_DURATION_SECONDS: &str = "fstore_chunk_duration_seconds";
}

/// Label keys.
pub mod labels {
    /// Run mode (`create` or `update`).
    pub const MODE: &str = "mode";
    /// Dispatch backend (`local` or `cluster`).
    pub const BACKEND: &str = "backend";
    /// Chunk outcome (`success` or `failure`).
    pub const RESULT: &str = "result";
}

/// Records runner metrics with consistent labels.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunnerMetrics;

impl RunnerMetrics {
    /// Creates a new metrics recorder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Records the start of a materialization run.
    pub fn record_materialization(&self, is_update: bool) {
        let mode = if is_update { "update" } else { "create" };
        counter!(names::MATERIALIZATIONS_TOTAL, labels::MODE => mode).increment(1);
    }

    /// Records chunks handed to a backend.
    pub fn record_chunks_dispatched(&self, backend: &str, chunks: u64) {
        counter!(
            names::CHUNKS_DISPATCHED_TOTAL,
            labels::BACKEND => backend.to_string(),
        )
        .increment(chunks);
    }

    /// Records rows written by a chunk worker.
    pub fn record_rows_written(&self, rows: u64) {
        counter!(names::ROWS_WRITTEN_TOTAL).increment(rows);
    }

    /// Records a failed chunk.
    pub fn record_chunk_failure(&self) {
        counter!(names::CHUNK_FAILURES_TOTAL).increment(1);
    }

    /// Records how long a chunk copy took.
    pub fn observe_chunk_duration(&self, success: bool, duration: Duration) {
        let result = if success { "success" } else { "failure" };
        histogram!(names::CHUNK_DURATION_SECONDS, labels::RESULT => result)
            .record(duration.as_secs_f64());
    }
}

/// Measures elapsed time for a chunk copy.
#[derive(Debug)]
pub struct ChunkTimer {
    start: Instant,
}

impl ChunkTimer {
    /// Starts the timer.
    #[must_use]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Records the elapsed time with the chunk's outcome.
    pub fn finish(self, metrics: &RunnerMetrics, success: bool) {
        metrics.observe_chunk_duration(success, self.start.elapsed());
    }
}
