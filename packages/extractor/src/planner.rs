//! Chunk planning.
//!
//! Turns a density model into an ordered partition of the search range:
//! contiguous, non-overlapping chunks whose widths shrink as estimated
//! density grows, with weekend days doubling the base width. The
//! per-chunk row cap is derived independently from a memory budget —
//! width controls query cost, cap bounds memory, and the two axes never
//! feed each other.
//!
//! Both planning modes implement [`ChunkStrategy`]: `PlannedStrategy`
//! walks a precomputed [`ChunkPlan`], `AdaptiveStrategy` is the legacy
//! loop that retunes its window from observed query times when no model
//! is available.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::traits::strategy::ChunkStrategy;
use crate::types::config::EngineConfig;
use crate::types::plan::{is_weekend, ChunkPlan, ChunkResult, DateRange, DensityModel, PlannedChunk};

/// Base chunk width for an estimated daily row count. Monotonically
/// non-increasing: denser periods never get wider chunks.
pub fn base_width_days(daily_rows: f64) -> i64 {
    if daily_rows < 100.0 {
        7
    } else if daily_rows < 1_000.0 {
        5
    } else if daily_rows < 5_000.0 {
        3
    } else if daily_rows < 10_000.0 {
        2
    } else {
        1
    }
}

/// Per-chunk row cap from the memory budget and assumed row payload,
/// clamped to the configured floor/ceiling. Independent of density.
pub fn recommended_row_cap(config: &EngineConfig) -> u32 {
    let raw = config.memory_budget_bytes / config.est_row_bytes.max(1);
    raw.clamp(
        u64::from(config.row_cap_floor),
        u64::from(config.row_cap_ceiling),
    ) as u32
}

/// Partition `range` into a [`ChunkPlan`] using `model`.
///
/// The base width comes from the model's overall mean (the uniform
/// estimate — no interpolation between samples); a chunk starting on a
/// weekend day gets double the base width. The last chunk is clipped to
/// the range end, so the union of all chunks is exactly `[start, end)`.
pub fn build_plan(model: &DensityModel, range: DateRange, config: &EngineConfig) -> ChunkPlan {
    let base = base_width_days(model.mean);
    let mut chunks = Vec::new();
    let mut cursor = range.start;

    while cursor < range.end {
        let weekend = is_weekend(cursor);
        let width = if weekend { base * 2 } else { base };
        let end = (cursor + ChronoDuration::days(width)).min(range.end);
        chunks.push(PlannedChunk {
            start: cursor,
            end,
            estimated_rows: Some(estimate_rows(model, cursor, end).round() as u64),
            weekend,
        });
        cursor = end;
    }

    ChunkPlan {
        chunks,
        row_cap: recommended_row_cap(config),
    }
}

/// Estimated rows in `[start, end)`: each day contributes its side's mean,
/// partial days proportionally.
fn estimate_rows(model: &DensityModel, start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let mut total = 0.0;
    let mut day = start;
    while day < end {
        let next = (day + ChronoDuration::days(1)).min(end);
        let fraction = (next - day).num_seconds() as f64 / 86_400.0;
        total += model.daily_estimate(is_weekend(day)) * fraction;
        day = next;
    }
    total
}

/// Strategy over a precomputed plan: chunks are consumed strictly in
/// order and feedback is ignored.
pub struct PlannedStrategy {
    queue: VecDeque<PlannedChunk>,
    row_cap: u32,
}

impl PlannedStrategy {
    pub fn new(plan: ChunkPlan) -> Self {
        Self {
            queue: plan.chunks.into(),
            row_cap: plan.row_cap,
        }
    }
}

impl ChunkStrategy for PlannedStrategy {
    fn kind(&self) -> &'static str {
        "planned"
    }

    fn row_cap(&self) -> u32 {
        self.row_cap
    }

    fn estimated_remaining_chunks(&self, _cursor: DateTime<Utc>) -> usize {
        self.queue.len()
    }

    fn next_chunk(&mut self, cursor: DateTime<Utc>) -> Option<PlannedChunk> {
        let chunk = self.queue.pop_front()?;
        debug_assert_eq!(chunk.start, cursor, "plan consumed out of order");
        Some(chunk)
    }
}

/// Legacy runtime-tuned strategy, used when sampling failed entirely (or
/// was disabled). Starts from the request's width hint and retunes after
/// every chunk: a slow query shrinks the next window by one day, a fast
/// one grows it, within the configured floor and ceiling.
pub struct AdaptiveStrategy {
    range_end: DateTime<Utc>,
    width_days: i64,
    min_days: i64,
    max_days: i64,
    row_cap: u32,
    slow_threshold: Duration,
}

impl AdaptiveStrategy {
    pub fn new(
        range: DateRange,
        width_hint: i64,
        row_cap: u32,
        config: &EngineConfig,
    ) -> Self {
        Self {
            range_end: range.end,
            width_days: width_hint.clamp(config.chunk_days_min, config.chunk_days_max),
            min_days: config.chunk_days_min,
            max_days: config.chunk_days_max,
            row_cap,
            slow_threshold: config.slow_query_threshold,
        }
    }

    /// Current window width in days.
    pub fn width_days(&self) -> i64 {
        self.width_days
    }
}

impl ChunkStrategy for AdaptiveStrategy {
    fn kind(&self) -> &'static str {
        "adaptive"
    }

    fn row_cap(&self) -> u32 {
        self.row_cap
    }

    fn estimated_remaining_chunks(&self, cursor: DateTime<Utc>) -> usize {
        if cursor >= self.range_end {
            return 0;
        }
        let days = DateRange::new(cursor, self.range_end).total_days();
        days.div_ceil(self.width_days).max(1) as usize
    }

    fn next_chunk(&mut self, cursor: DateTime<Utc>) -> Option<PlannedChunk> {
        if cursor >= self.range_end {
            return None;
        }
        let end = (cursor + ChronoDuration::days(self.width_days)).min(self.range_end);
        Some(PlannedChunk {
            start: cursor,
            end,
            estimated_rows: None,
            weekend: is_weekend(cursor),
        })
    }

    fn observe(&mut self, result: &ChunkResult) {
        // A sparse chunk (nonzero but below the minimum-results threshold)
        // counts as fast regardless of its measured latency.
        if result.sparse {
            if self.width_days < self.max_days {
                self.width_days += 1;
            }
            return;
        }
        if result.elapsed > self.slow_threshold {
            self.width_days = (self.width_days - 1).max(self.min_days);
        } else if result.elapsed > Duration::ZERO && self.width_days < self.max_days {
            self.width_days += 1;
        }
    }
}
