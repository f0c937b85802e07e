//! Chunk planning.
//!
//! A materialization of `R` rows is split into contiguous row ranges of at
//! most `C` rows. All arithmetic is integer-only:
//!
//! | Rows | Chunks | Chunk size |
//! |------|--------|------------|
//! | `R <= C` (including `R = 0`) | 1 | `R` |
//! | `R > C`, `C = 0` | 0 | 0 |
//! | `R > C` | `ceil(R / C)` | `C` (last chunk may be smaller) |

use std::ops::Range;

use crate::error::{Error, Result};

/// Largest number of rows a single chunk worker copies.
pub const MAX_CHUNK_ROWS: u64 = 16_777_216;

/// How a materialization is split into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    /// Rows in the materialization.
    pub num_rows: u64,
    /// Rows per chunk.
    pub chunk_size: u64,
    /// Number of chunks to dispatch.
    pub num_chunks: u64,
}

impl ChunkPlan {
    /// Computes the plan for `num_rows` rows and a maximum chunk size.
    #[must_use]
    pub const fn compute(num_rows: u64, max_chunk_rows: u64) -> Self {
        if num_rows <= max_chunk_rows {
            return Self {
                num_rows,
                chunk_size: num_rows,
                num_chunks: 1,
            };
        }
        if max_chunk_rows == 0 {
            return Self {
                num_rows,
                chunk_size: 0,
                num_chunks: 0,
            };
        }
        let mut num_chunks = num_rows / max_chunk_rows;
        if num_rows % max_chunk_rows != 0 {
            num_chunks += 1;
        }
        Self {
            num_rows,
            chunk_size: max_chunk_rows,
            num_chunks,
        }
    }

    /// Returns the row range copied by chunk `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidChunk`] if the chunk starts at or past the
    /// last row of a non-empty materialization.
    pub fn bounds(&self, index: u64) -> Result<Range<u64>> {
        chunk_bounds(index, self.chunk_size, self.num_rows)
    }
}

/// Returns the row range `[index * chunk_size, min((index + 1) * chunk_size, num_rows))`.
///
/// An empty materialization accepts chunk 0 with an empty range.
///
/// # Errors
///
/// Returns [`Error::InvalidChunk`] if the range would start at or past
/// `num_rows` for `num_rows > 0`, or if the arithmetic overflows.
pub fn chunk_bounds(index: u64, chunk_size: u64, num_rows: u64) -> Result<Range<u64>> {
    let invalid = || Error::InvalidChunk {
        index,
        chunk_size,
        num_rows,
    };
    if num_rows == 0 {
        return if index == 0 { Ok(0..0) } else { Err(invalid()) };
    }
    let start = index.checked_mul(chunk_size).ok_or_else(invalid)?;
    if start >= num_rows || chunk_size == 0 {
        return Err(invalid());
    }
    let end = start.saturating_add(chunk_size).min(num_rows);
    Ok(start..end)
}
