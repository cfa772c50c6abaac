//! Progress events, job status, and terminal outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Planning,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Cancelled | JobStatus::Failed
        )
    }
}

/// How a job ended. Carried by the terminal event and retained for late
/// observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    /// All chunks ran and at least one row matched.
    Completed {
        rows: usize,
        export_path: Option<String>,
    },

    /// All chunks ran and nothing matched. The exporter is skipped; this
    /// is a distinct outcome, not an error.
    Empty,

    /// Cancellation was observed at a chunk boundary. Rows accumulated
    /// before it are retained and exported.
    Cancelled {
        rows: usize,
        export_path: Option<String>,
    },

    /// Setup or a chunk query failed. Rows accumulated before the failure
    /// are retained and exported; the export, if any, is partial.
    Failed {
        error: String,
        rows: usize,
        export_path: Option<String>,
    },
}

impl JobOutcome {
    pub fn status(&self) -> JobStatus {
        match self {
            JobOutcome::Completed { .. } | JobOutcome::Empty => JobStatus::Completed,
            JobOutcome::Cancelled { .. } => JobStatus::Cancelled,
            JobOutcome::Failed { .. } => JobStatus::Failed,
        }
    }
}

/// One event on a job's progress channel.
///
/// `Heartbeat` and `Lagged` are consumer-side: the first is produced by an
/// idle blocking read, the second tells a slow consumer how many events it
/// missed. Everything else is produced by the job runner in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Log {
        at: DateTime<Utc>,
        message: String,
    },

    Progress {
        /// 0.0..=100.0, chunks processed over total planned chunks.
        percent: f32,
        chunks_done: usize,
        /// Total planned chunks; an estimate in adaptive mode.
        chunks_total: usize,
        rows_so_far: usize,
        /// Average per-chunk time so far times chunks remaining. `None`
        /// until at least one timed chunk has run.
        eta_secs: Option<u64>,
    },

    /// A chunk hit its row cap: rows may be missing from that sub-range.
    Warning {
        chunk_start: DateTime<Utc>,
        chunk_end: DateTime<Utc>,
        message: String,
    },

    Error {
        message: String,
    },

    /// Authoritative end-of-stream marker. Consumers must treat this as
    /// final even if they also track a separate status flag.
    Terminal {
        outcome: JobOutcome,
    },

    Heartbeat {
        at: DateTime<Utc>,
    },

    Lagged {
        missed: u64,
    },
}

impl ProgressEvent {
    /// Stable tag for SSE event names and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::Log { .. } => "log",
            ProgressEvent::Progress { .. } => "progress",
            ProgressEvent::Warning { .. } => "warning",
            ProgressEvent::Error { .. } => "error",
            ProgressEvent::Terminal { .. } => "terminal",
            ProgressEvent::Heartbeat { .. } => "heartbeat",
            ProgressEvent::Lagged { .. } => "lagged",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Terminal { .. })
    }
}
