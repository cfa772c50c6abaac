//! Job registry: the explicit handle the API layer talks to.
//!
//! Owns per-job bookkeeping (channel, cancellation token, lifecycle) in a
//! map behind its own lock — never ambient global state. Submitting
//! validates the request, spawns one dedicated task for the job, and
//! returns immediately with the job id; the submitter never blocks on
//! query execution. Terminal entries stick around for a retention window
//! so late observers can still read final state, then get swept.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::error::ConfigError;
use crate::progress::{ProgressChannel, ProgressStream};
use crate::runner::{EngineDeps, JobLifecycle, JobRunner};
use crate::types::progress::{JobStatus, ProgressEvent};
use crate::types::request::SearchRequest;

/// Result of a cancel call. Cancelling a finished or unknown job is a
/// no-op reported as `NotFound`, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Requested,
    NotFound,
}

/// Read-only summary of one registered job.
#[derive(Debug, Clone, serde::Serialize)]
pub struct JobSnapshot {
    pub id: Uuid,
    pub keywords: Vec<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
}

struct JobEntry {
    request: SearchRequest,
    channel: ProgressChannel,
    cancel: CancellationToken,
    lifecycle: JobLifecycle,
    submitted_at: DateTime<Utc>,
}

/// Handle to the engine: submit, subscribe, cancel, list.
///
/// Cheap to clone; all clones share the same job map.
#[derive(Clone)]
pub struct JobRegistry {
    deps: EngineDeps,
    jobs: Arc<RwLock<HashMap<Uuid, Arc<JobEntry>>>>,
}

impl JobRegistry {
    pub fn new(deps: EngineDeps) -> Self {
        Self {
            deps,
            jobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Validate `request` and start a job for it on its own task.
    ///
    /// Returns the job id immediately. Validation failures mean no job
    /// was created at all.
    pub fn submit(&self, request: SearchRequest) -> Result<Uuid, ConfigError> {
        request.validate()?;

        let job_id = Uuid::new_v4();
        let channel = ProgressChannel::new(
            self.deps.config.channel_capacity,
            self.deps.config.heartbeat_interval,
        );
        let cancel = CancellationToken::new();
        let lifecycle = JobLifecycle::new();

        let entry = Arc::new(JobEntry {
            request: request.clone(),
            channel: channel.clone(),
            cancel: cancel.clone(),
            lifecycle: lifecycle.clone(),
            submitted_at: Utc::now(),
        });
        self.jobs.write().unwrap().insert(job_id, entry);

        let runner = JobRunner::new(
            job_id,
            request,
            self.deps.clone(),
            channel,
            cancel,
            lifecycle,
        );
        let retention = self.deps.config.retention;
        let jobs = self.jobs.clone();
        tokio::spawn(async move {
            runner.run().await;
            // Keep terminal bookkeeping around for late observers.
            tokio::time::sleep(retention).await;
            jobs.write().unwrap().remove(&job_id);
            debug!(job_id = %job_id, "job entry swept after retention");
        });

        Ok(job_id)
    }

    /// Subscribe to a job's event stream.
    ///
    /// A subscriber arriving after the job finished gets the terminal
    /// event immediately. Returns `None` for unknown (or swept) jobs.
    pub fn subscribe(&self, job_id: Uuid) -> Option<ProgressStream> {
        let entry = self.jobs.read().unwrap().get(&job_id).cloned()?;
        // Subscribe before checking the outcome: the runner records the
        // outcome before publishing the terminal event, so one of the two
        // paths always delivers it.
        let mut stream = entry.channel.subscribe();
        if let Some(outcome) = entry.lifecycle.outcome() {
            stream.prime(ProgressEvent::Terminal { outcome });
        }
        Some(stream)
    }

    /// Request cancellation of a running job. Observed at the next chunk
    /// boundary; the in-flight query finishes first.
    pub fn cancel(&self, job_id: Uuid) -> CancelOutcome {
        let entry = self.jobs.read().unwrap().get(&job_id).cloned();
        match entry {
            Some(entry) if !entry.lifecycle.status().is_terminal() => {
                entry.cancel.cancel();
                debug!(job_id = %job_id, "cancellation requested");
                CancelOutcome::Requested
            }
            _ => CancelOutcome::NotFound,
        }
    }

    /// Current status of one job.
    pub fn status(&self, job_id: Uuid) -> Option<JobStatus> {
        let entry = self.jobs.read().unwrap().get(&job_id).cloned()?;
        Some(entry.lifecycle.status())
    }

    /// Snapshots of every known job, most recent first.
    pub fn list(&self) -> Vec<JobSnapshot> {
        let mut snapshots: Vec<JobSnapshot> = self
            .jobs
            .read()
            .unwrap()
            .iter()
            .map(|(id, entry)| JobSnapshot {
                id: *id,
                keywords: entry.request.keywords.clone(),
                start: entry.request.start,
                end: entry.request.end,
                status: entry.lifecycle.status(),
                submitted_at: entry.submitted_at,
            })
            .collect();
        snapshots.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        snapshots
    }

    pub fn job_count(&self) -> usize {
        self.jobs.read().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::memory::MemoryStore;
    use crate::testing::MockExporter;
    use crate::types::config::EngineConfig;
    use crate::types::progress::JobOutcome;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use std::time::Duration;

    fn registry_with(config: EngineConfig) -> JobRegistry {
        JobRegistry::new(EngineDeps {
            store: Arc::new(MemoryStore::new()),
            exporter: Arc::new(MockExporter::new()),
            config,
        })
    }

    fn registry() -> JobRegistry {
        registry_with(EngineConfig {
            heartbeat_interval: Duration::from_millis(50),
            ..EngineConfig::default()
        })
    }

    fn request() -> SearchRequest {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        SearchRequest::new(vec!["x".into()], start, start + ChronoDuration::days(2))
    }

    async fn drain_to_terminal(stream: &mut ProgressStream) -> JobOutcome {
        while let Some(event) = stream.next().await {
            if let ProgressEvent::Terminal { outcome } = event {
                return outcome;
            }
        }
        panic!("stream ended without a terminal event");
    }

    #[tokio::test]
    async fn invalid_request_never_becomes_a_job() {
        let registry = registry();
        let mut req = request();
        req.keywords.clear();
        assert!(registry.submit(req).is_err());
        assert_eq!(registry.job_count(), 0);
    }

    #[tokio::test]
    async fn submitted_job_runs_to_terminal() {
        let registry = registry();
        let job_id = registry.submit(request()).unwrap();
        let mut stream = registry.subscribe(job_id).unwrap();
        assert_eq!(drain_to_terminal(&mut stream).await, JobOutcome::Empty);
        assert_eq!(registry.status(job_id), Some(JobStatus::Completed));
    }

    #[tokio::test]
    async fn late_subscriber_receives_terminal_event() {
        let registry = registry();
        let job_id = registry.submit(request()).unwrap();

        // Let the job finish before subscribing.
        let mut first = registry.subscribe(job_id).unwrap();
        drain_to_terminal(&mut first).await;

        let mut late = registry.subscribe(job_id).unwrap();
        assert_eq!(drain_to_terminal(&mut late).await, JobOutcome::Empty);
    }

    #[tokio::test]
    async fn cancel_unknown_job_reports_not_found() {
        let registry = registry();
        assert_eq!(registry.cancel(Uuid::new_v4()), CancelOutcome::NotFound);
    }

    #[tokio::test]
    async fn cancel_finished_job_is_a_not_found_noop() {
        let registry = registry();
        let job_id = registry.submit(request()).unwrap();
        let mut stream = registry.subscribe(job_id).unwrap();
        drain_to_terminal(&mut stream).await;

        assert_eq!(registry.cancel(job_id), CancelOutcome::NotFound);
    }

    #[tokio::test]
    async fn entries_are_swept_after_retention() {
        let registry = registry_with(EngineConfig {
            retention: Duration::from_millis(50),
            heartbeat_interval: Duration::from_millis(50),
            ..EngineConfig::default()
        });
        let job_id = registry.submit(request()).unwrap();
        let mut stream = registry.subscribe(job_id).unwrap();
        drain_to_terminal(&mut stream).await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(registry.job_count(), 0);
        assert!(registry.subscribe(job_id).is_none());
    }

    #[tokio::test]
    async fn list_reports_most_recent_first() {
        let registry = registry();
        let a = registry.submit(request()).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let b = registry.submit(request()).unwrap();

        let listed = registry.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, b);
        assert_eq!(listed[1].id, a);
    }
}
