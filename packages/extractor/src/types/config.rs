//! Engine tuning knobs.

use std::time::Duration;

/// Tuning parameters for sampling, planning and execution.
///
/// The defaults reproduce the production behavior; tests override
/// individual fields.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Narrowest chunk the adaptive strategy will shrink to.
    pub chunk_days_min: i64,

    /// Widest chunk the adaptive strategy will grow to.
    pub chunk_days_max: i64,

    /// A chunk query slower than this makes the adaptive strategy
    /// shrink the next window.
    pub slow_query_threshold: Duration,

    /// A chunk returning fewer rows than this (but more than zero) is
    /// treated as "fast" for sizing and excluded from total-time
    /// accounting.
    pub min_rows_per_chunk: usize,

    /// Row cap applied when the planner could not derive one.
    pub default_row_cap: u32,

    /// Memory budget the recommended cap is derived from.
    pub memory_budget_bytes: u64,

    /// Assumed average payload size of one row.
    pub est_row_bytes: u64,

    /// Lower clamp for the derived per-chunk row cap.
    pub row_cap_floor: u32,

    /// Upper clamp for the derived per-chunk row cap.
    pub row_cap_ceiling: u32,

    /// Ranges longer than this get extra random sampler probes.
    pub random_probe_threshold_days: i64,

    /// Progress channel capacity per job.
    pub channel_capacity: usize,

    /// Idle consumer reads emit a heartbeat after this long.
    pub heartbeat_interval: Duration,

    /// How long terminal job bookkeeping is retained for late observers.
    pub retention: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_days_min: 1,
            chunk_days_max: 7,
            slow_query_threshold: Duration::from_secs(30),
            min_rows_per_chunk: 1_000,
            default_row_cap: 20_000,
            memory_budget_bytes: 100 * 1024 * 1024,
            est_row_bytes: 1_200,
            row_cap_floor: 5_000,
            row_cap_ceiling: 50_000,
            random_probe_threshold_days: 14,
            channel_capacity: 256,
            heartbeat_interval: Duration::from_secs(10),
            retention: Duration::from_secs(300),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retention window for terminal job bookkeeping.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Set the idle heartbeat interval for consumer reads.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }
}
