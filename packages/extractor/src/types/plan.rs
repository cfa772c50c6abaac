//! Sampling statistics, density model, and chunk plan types.

use std::time::Duration;

use chrono::{DateTime, Datelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::types::row::MessageRow;

/// A half-open UTC instant range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Whole duration of the range.
    pub fn span(&self) -> chrono::Duration {
        self.end - self.start
    }

    /// Number of days in the range, rounded up to cover partial days.
    pub fn total_days(&self) -> i64 {
        let secs = self.span().num_seconds();
        (secs + 86_399) / 86_400
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }

    /// True when this range and `other` share any instant.
    pub fn intersects(&self, other: &DateRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// True for Saturday and Sunday (UTC).
pub fn is_weekend(at: DateTime<Utc>) -> bool {
    matches!(at.weekday(), Weekday::Sat | Weekday::Sun)
}

/// One density probe: the row count observed in the 24h window following
/// the sampled instant, plus the probe's own latency.
#[derive(Debug, Clone)]
pub struct SampleStat {
    pub probed_at: DateTime<Utc>,
    pub rows_in_day: i64,
    pub latency: Duration,
    pub weekend: bool,
}

/// Aggregated density statistics for one job. Derived once, read-only
/// afterward.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityModel {
    /// Mean rows per day across all successful probes.
    pub mean: f64,
    /// Sample standard deviation (zero with fewer than two probes).
    pub std_dev: f64,
    pub weekday_mean: f64,
    pub weekend_mean: f64,
    /// Number of probes that succeeded. Zero marks the fallback model:
    /// sampling failed entirely and the legacy plan applies.
    pub sample_count: usize,
}

impl DensityModel {
    /// Model used when every probe failed. Planning falls back to the
    /// fixed legacy plan when it sees this.
    pub fn fallback() -> Self {
        Self {
            mean: 0.0,
            std_dev: 0.0,
            weekday_mean: 0.0,
            weekend_mean: 0.0,
            sample_count: 0,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.sample_count == 0
    }

    /// Aggregate probe results. An empty slice yields the fallback model.
    /// A side (weekday/weekend) with no samples defaults to the overall
    /// mean.
    pub fn from_stats(stats: &[SampleStat]) -> Self {
        if stats.is_empty() {
            return Self::fallback();
        }

        let n = stats.len() as f64;
        let mean = stats.iter().map(|s| s.rows_in_day as f64).sum::<f64>() / n;

        let std_dev = if stats.len() >= 2 {
            let var = stats
                .iter()
                .map(|s| {
                    let d = s.rows_in_day as f64 - mean;
                    d * d
                })
                .sum::<f64>()
                / (n - 1.0);
            var.sqrt()
        } else {
            0.0
        };

        let side_mean = |weekend: bool| {
            let side: Vec<f64> = stats
                .iter()
                .filter(|s| s.weekend == weekend)
                .map(|s| s.rows_in_day as f64)
                .collect();
            if side.is_empty() {
                mean
            } else {
                side.iter().sum::<f64>() / side.len() as f64
            }
        };

        Self {
            mean,
            std_dev,
            weekday_mean: side_mean(false),
            weekend_mean: side_mean(true),
            sample_count: stats.len(),
        }
    }

    /// Per-day estimate for a weekday or weekend day.
    pub fn daily_estimate(&self, weekend: bool) -> f64 {
        if weekend {
            self.weekend_mean
        } else {
            self.weekday_mean
        }
    }
}

/// One contiguous date sub-range to be processed as a single bounded query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlannedChunk {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Estimated rows in the chunk; `None` when no model was available
    /// (adaptive mode).
    pub estimated_rows: Option<u64>,
    /// Whether the chunk starts on a weekend day (which drove its width).
    pub weekend: bool,
}

impl PlannedChunk {
    pub fn range(&self) -> DateRange {
        DateRange::new(self.start, self.end)
    }

    pub fn days(&self) -> i64 {
        DateRange::new(self.start, self.end).total_days()
    }
}

/// The full precomputed partition of a job's range, with the cap the
/// planner recommends for every chunk.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    pub chunks: Vec<PlannedChunk>,
    pub row_cap: u32,
}

/// Outcome of executing one chunk.
#[derive(Debug, Clone)]
pub struct ChunkResult {
    pub rows: Vec<MessageRow>,
    pub elapsed: Duration,
    /// The fetch returned exactly `cap` rows: the sub-range may be
    /// incomplete and could be re-run with a narrower window.
    pub cap_hit: bool,
    /// Nonzero but below the minimum-results threshold. Treated as "fast"
    /// for adaptive sizing and excluded from total-time accounting.
    pub sparse: bool,
}
