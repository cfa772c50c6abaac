//! Chunk planning as a capability.
//!
//! Two implementations exist: a precomputed density plan and the legacy
//! runtime-tuned loop. The job runner selects one at start and drives it
//! through this trait instead of branching through the run loop.

use chrono::{DateTime, Utc};

use crate::types::plan::{ChunkResult, PlannedChunk};

/// Source of the next chunk to execute, plus the feedback hook the
/// adaptive implementation resizes itself through.
pub trait ChunkStrategy: Send {
    /// Strategy label for logs.
    fn kind(&self) -> &'static str;

    /// Row cap applied to every chunk this strategy issues.
    fn row_cap(&self) -> u32;

    /// Chunks expected after `cursor`, for percent/ETA arithmetic. Exact
    /// for a precomputed plan, an estimate for the adaptive loop.
    fn estimated_remaining_chunks(&self, cursor: DateTime<Utc>) -> usize;

    /// The chunk starting at `cursor`, or `None` once the range is
    /// exhausted.
    fn next_chunk(&mut self, cursor: DateTime<Utc>) -> Option<PlannedChunk>;

    /// Observe an executed chunk. The adaptive strategy resizes its
    /// window here; the planned strategy ignores it.
    fn observe(&mut self, _result: &ChunkResult) {}
}
