//! Job runner: drives one search job from planning to a terminal state.
//!
//! The runner exclusively owns its job's state and chunk plan. It polls
//! the cancellation token once per chunk boundary (never mid-query),
//! publishes every notable event onto the job's progress channel, and
//! hands accumulated rows to the exporter when it reaches a terminal
//! state.
//!
//! # State machine
//!
//! ```text
//! Planning ──► Running ──► Completed | Cancelled | Failed
//!     │                        ▲
//!     └── setup failure ───────┘ (Failed)
//! ```

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{ExtractError, StoreError};
use crate::executor::run_chunk;
use crate::planner::{build_plan, AdaptiveStrategy, PlannedStrategy};
use crate::progress::ProgressChannel;
use crate::sampler::sample_density;
use crate::traits::exporter::ResultExporter;
use crate::traits::store::MessageStore;
use crate::traits::strategy::ChunkStrategy;
use crate::types::config::EngineConfig;
use crate::types::plan::PlannedChunk;
use crate::types::progress::{JobOutcome, JobStatus, ProgressEvent};
use crate::types::request::SearchRequest;
use crate::types::row::MessageRow;

/// Shared collaborators a job runs against.
#[derive(Clone)]
pub struct EngineDeps {
    pub store: Arc<dyn MessageStore>,
    pub exporter: Arc<dyn ResultExporter>,
    pub config: EngineConfig,
}

/// Shared view of a job's lifecycle: written by the runner, read by the
/// registry and the API layer. The outcome is recorded before the
/// terminal event publishes, so a reader that sees no outcome yet and
/// subscribes will always receive the terminal event live.
#[derive(Clone)]
pub struct JobLifecycle {
    status: Arc<RwLock<JobStatus>>,
    outcome: Arc<RwLock<Option<JobOutcome>>>,
}

impl JobLifecycle {
    pub fn new() -> Self {
        Self {
            status: Arc::new(RwLock::new(JobStatus::Planning)),
            outcome: Arc::new(RwLock::new(None)),
        }
    }

    pub fn status(&self) -> JobStatus {
        *self.status.read().unwrap()
    }

    pub fn outcome(&self) -> Option<JobOutcome> {
        self.outcome.read().unwrap().clone()
    }

    fn set_status(&self, status: JobStatus) {
        *self.status.write().unwrap() = status;
    }

    fn set_outcome(&self, outcome: JobOutcome) {
        *self.outcome.write().unwrap() = Some(outcome);
    }
}

impl Default for JobLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Mutable per-job bookkeeping, owned exclusively by the runner.
#[derive(Default)]
struct JobState {
    chunks_attempted: usize,
    /// Chunks whose elapsed time counts toward the total (sparse chunks
    /// are excluded from time accounting).
    timed_chunks: usize,
    rows: Vec<MessageRow>,
    total_query_time: Duration,
}

/// How the run loop ended, before export.
enum RunEnd {
    Completed,
    Cancelled,
    Failed(String),
}

/// Drives one job. Constructed by the registry, consumed by `run`.
pub struct JobRunner {
    job_id: Uuid,
    request: SearchRequest,
    deps: EngineDeps,
    channel: ProgressChannel,
    cancel: CancellationToken,
    lifecycle: JobLifecycle,
}

impl JobRunner {
    pub fn new(
        job_id: Uuid,
        request: SearchRequest,
        deps: EngineDeps,
        channel: ProgressChannel,
        cancel: CancellationToken,
        lifecycle: JobLifecycle,
    ) -> Self {
        Self {
            job_id,
            request,
            deps,
            channel,
            cancel,
            lifecycle,
        }
    }

    /// Run the job to a terminal state. Never panics; every exit path
    /// publishes a terminal event.
    pub async fn run(self) -> JobOutcome {
        self.lifecycle.set_status(JobStatus::Planning);
        self.log(format!(
            "search started: keywords=[{}], range {} to {}",
            self.request.keywords.join(", "),
            self.request.start,
            self.request.end,
        ));

        // Preflight: an unreachable store fails the job before any chunk.
        if let Err(e) = self.deps.store.ping().await {
            return self.fail_setup(e);
        }

        let mut strategy = self.select_strategy().await;
        self.log(format!(
            "strategy selected: {} (row cap {})",
            strategy.kind(),
            strategy.row_cap()
        ));

        self.lifecycle.set_status(JobStatus::Running);
        let mut state = JobState::default();
        let end = self.run_chunks(strategy.as_mut(), &mut state).await;
        self.finish(end, state).await
    }

    /// Sample and plan, or fall back to the legacy adaptive loop.
    async fn select_strategy(&self) -> Box<dyn ChunkStrategy> {
        let range = self.request.range();

        if self.request.adaptive {
            self.log("sampling density to optimize chunking".to_string());
            let model = sample_density(
                self.deps.store.as_ref(),
                &self.request.keywords,
                range,
                &self.deps.config,
            )
            .await;

            if !model.is_fallback() {
                let plan = build_plan(&model, range, &self.deps.config);
                let estimated_total: u64 =
                    plan.chunks.iter().filter_map(|c| c.estimated_rows).sum();
                self.log(format!(
                    "density plan ready: {:.1} rows/day mean over {} probes, {} chunks, ~{} rows estimated",
                    model.mean,
                    model.sample_count,
                    plan.chunks.len(),
                    estimated_total,
                ));
                return Box::new(PlannedStrategy::new(plan));
            }

            self.log("sampling failed entirely, using fixed legacy plan".to_string());
        }

        Box::new(AdaptiveStrategy::new(
            range,
            self.request.chunk_days_hint,
            self.request.row_cap,
            &self.deps.config,
        ))
    }

    /// The Running loop. Cancellation is polled before each chunk; an
    /// in-flight query always runs to completion or failure first.
    async fn run_chunks(&self, strategy: &mut dyn ChunkStrategy, state: &mut JobState) -> RunEnd {
        let range = self.request.range();
        let mut cursor = range.start;

        loop {
            if self.cancel.is_cancelled() {
                self.log(format!(
                    "cancellation observed after {} chunks, {} rows retained",
                    state.chunks_attempted,
                    state.rows.len()
                ));
                return RunEnd::Cancelled;
            }

            let Some(chunk) = strategy.next_chunk(cursor) else {
                return RunEnd::Completed;
            };
            state.chunks_attempted += 1;

            let result = run_chunk(
                self.deps.store.as_ref(),
                &self.request.keywords,
                &chunk,
                strategy.row_cap(),
                self.deps.config.min_rows_per_chunk,
            )
            .await;

            let result = match result {
                Ok(result) => result,
                Err(failure) => {
                    let cause = failure.source.cause();
                    let message = format!(
                        "{} (chunk {} to {})",
                        ExtractError::from(failure),
                        chunk.start,
                        chunk.end,
                    );
                    error!(job_id = %self.job_id, cause, "{message}");
                    self.channel.publish(ProgressEvent::Error {
                        message: message.clone(),
                    });
                    return RunEnd::Failed(message);
                }
            };

            strategy.observe(&result);

            if result.cap_hit {
                self.warn_cap(&chunk, strategy.row_cap());
            }
            if !result.sparse {
                state.total_query_time += result.elapsed;
                state.timed_chunks += 1;
            }
            state.rows.extend(result.rows);
            cursor = chunk.end;

            self.publish_progress(state, strategy.estimated_remaining_chunks(cursor));
        }
    }

    /// Export what was accumulated and publish the terminal event.
    ///
    /// Rows are handed to the exporter in every terminal state (a failed
    /// or cancelled job exports its partial rows — documented, not
    /// discarded). Zero rows skip the exporter entirely; for a clean run
    /// that is the distinct "empty result" outcome.
    async fn finish(&self, end: RunEnd, state: JobState) -> JobOutcome {
        let rows = state.rows;
        let export_path = if rows.is_empty() {
            None
        } else {
            let file_name = self.request.export_file_name(Utc::now());
            match self.deps.exporter.export(&rows, &file_name).await {
                Ok(path) => {
                    // Tracing only: the terminal event carries the path, and
                    // observers rely on the failure event (if any) being the
                    // last non-terminal event on the channel.
                    info!(
                        job_id = %self.job_id,
                        rows = rows.len(),
                        chunks = state.chunks_attempted,
                        query_secs = state.total_query_time.as_secs_f64(),
                        path = %path.display(),
                        "export written"
                    );
                    Some(path.display().to_string())
                }
                Err(e) => {
                    let message = format!("export failed: {e}");
                    error!(job_id = %self.job_id, "{message}");
                    self.channel.publish(ProgressEvent::Error {
                        message: message.clone(),
                    });
                    // A completed run without its deliverable is a failure;
                    // cancelled/failed runs keep their outcome and just
                    // lose the partial file.
                    if matches!(end, RunEnd::Completed) {
                        return self.terminal(JobOutcome::Failed {
                            error: message,
                            rows: rows.len(),
                            export_path: None,
                        });
                    }
                    None
                }
            }
        };

        let outcome = match end {
            RunEnd::Completed if rows.is_empty() => JobOutcome::Empty,
            RunEnd::Completed => JobOutcome::Completed {
                rows: rows.len(),
                export_path,
            },
            RunEnd::Cancelled => JobOutcome::Cancelled {
                rows: rows.len(),
                export_path,
            },
            RunEnd::Failed(error) => JobOutcome::Failed {
                error,
                rows: rows.len(),
                export_path,
            },
        };
        self.terminal(outcome)
    }

    fn fail_setup(&self, cause: StoreError) -> JobOutcome {
        let label = cause.cause();
        let message = ExtractError::Connectivity(cause).to_string();
        error!(job_id = %self.job_id, cause = label, "{message}");
        self.channel.publish(ProgressEvent::Error {
            message: message.clone(),
        });
        self.terminal(JobOutcome::Failed {
            error: message,
            rows: 0,
            export_path: None,
        })
    }

    /// Record the outcome, then publish the terminal sentinel. Order
    /// matters: see [`JobLifecycle`].
    fn terminal(&self, outcome: JobOutcome) -> JobOutcome {
        self.lifecycle.set_outcome(outcome.clone());
        self.lifecycle.set_status(outcome.status());
        info!(job_id = %self.job_id, status = ?outcome.status(), "job finished");
        self.channel.publish(ProgressEvent::Terminal {
            outcome: outcome.clone(),
        });
        outcome
    }

    fn publish_progress(&self, state: &JobState, remaining: usize) {
        let done = state.chunks_attempted;
        let total = done + remaining;
        let percent = if total == 0 {
            100.0
        } else {
            done as f32 / total as f32 * 100.0
        };
        let eta_secs = if state.timed_chunks > 0 && remaining > 0 {
            let avg = state.total_query_time / state.timed_chunks as u32;
            Some((avg * remaining as u32).as_secs())
        } else {
            None
        };
        self.channel.publish(ProgressEvent::Progress {
            percent,
            chunks_done: done,
            chunks_total: total,
            rows_so_far: state.rows.len(),
            eta_secs,
        });
    }

    fn warn_cap(&self, chunk: &PlannedChunk, cap: u32) {
        let message = format!(
            "hit row cap of {cap} in chunk {} to {}: results may be missing from this sub-range",
            chunk.start, chunk.end
        );
        warn!(job_id = %self.job_id, "{message}");
        self.channel.publish(ProgressEvent::Warning {
            chunk_start: chunk.start,
            chunk_end: chunk.end,
            message,
        });
    }

    fn log(&self, message: String) {
        info!(job_id = %self.job_id, "{message}");
        self.channel.publish(ProgressEvent::Log {
            at: Utc::now(),
            message,
        });
    }
}
