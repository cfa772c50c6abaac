//! End-to-end job scenarios against scripted collaborators.
//!
//! These drive the full runner — sampling, planning, execution, progress,
//! export — through the same path the registry uses, with a scripted
//! store standing in for PostgreSQL.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use extractor::progress::ProgressChannel;
use extractor::runner::{EngineDeps, JobLifecycle, JobRunner};
use extractor::testing::{row, MockExporter, ScriptedStore};
use extractor::{DateRange, EngineConfig, JobOutcome, ProgressEvent, SearchRequest};

fn day(n: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, n, 0, 0, 0).unwrap()
}

fn request(start_day: u32, days: i64) -> SearchRequest {
    SearchRequest::new(
        vec!["x".into()],
        day(start_day),
        day(start_day) + ChronoDuration::days(days),
    )
}

struct Harness {
    store: Arc<ScriptedStore>,
    exporter: Arc<MockExporter>,
    channel: ProgressChannel,
    cancel: CancellationToken,
    runner: JobRunner,
}

fn harness(request: SearchRequest) -> Harness {
    harness_with(
        request,
        EngineConfig {
            heartbeat_interval: Duration::from_millis(50),
            ..EngineConfig::default()
        },
    )
}

fn harness_with(request: SearchRequest, config: EngineConfig) -> Harness {
    let store = Arc::new(ScriptedStore::new());
    let exporter = Arc::new(MockExporter::new());
    let channel = ProgressChannel::new(config.channel_capacity, config.heartbeat_interval);
    let cancel = CancellationToken::new();
    let runner = JobRunner::new(
        Uuid::new_v4(),
        request,
        EngineDeps {
            store: store.clone(),
            exporter: exporter.clone(),
            config,
        },
        channel.clone(),
        cancel.clone(),
        JobLifecycle::new(),
    );
    Harness {
        store,
        exporter,
        channel,
        cancel,
        runner,
    }
}

/// Run the job with a subscriber attached from the start, and collect
/// every event through the terminal sentinel.
async fn run_collecting(harness: Harness) -> (JobOutcome, Vec<ProgressEvent>, Arc<ScriptedStore>, Arc<MockExporter>) {
    let Harness {
        store,
        exporter,
        channel,
        runner,
        ..
    } = harness;
    let mut stream = channel.subscribe();
    let outcome = runner.run().await;

    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        let terminal = event.is_terminal();
        events.push(event);
        if terminal {
            break;
        }
    }
    (outcome, events, store, exporter)
}

fn window_days(range: &DateRange) -> i64 {
    (range.end - range.start).num_days()
}

// Scenario A: all sample points return zero — the plan uses wide 7-day
// chunks and the job completes with the distinct empty outcome.
#[tokio::test]
async fn scenario_a_empty_range_plans_wide_and_completes_empty() {
    let h = harness(request(1, 10));
    let (outcome, events, store, exporter) = run_collecting(h).await;

    assert_eq!(outcome, JobOutcome::Empty);
    assert_eq!(exporter.export_count(), 0, "zero rows skip the exporter");

    let windows = store.fetched_windows();
    assert_eq!(window_days(&windows[0]), 7, "sparse density gets 7-day chunks");
    assert_eq!(window_days(&windows[1]), 3, "last chunk clipped to range end");

    assert!(events.iter().all(|e| !matches!(e, ProgressEvent::Warning { .. } | ProgressEvent::Error { .. })));
    assert!(events.last().unwrap().is_terminal());
}

// Scenario B: a mid-range chunk fails — the job fails, earlier rows are
// retained for export, and the error event is the last non-terminal event.
#[tokio::test]
async fn scenario_b_mid_range_failure_fails_job_but_retains_rows() {
    let mut req = request(1, 3);
    req.adaptive = false;
    req.chunk_days_hint = 1;
    let h = harness(req);

    // Two matching rows on day 1; day 2 is poisoned.
    h.store.inner().insert(row(1, day(1) + ChronoDuration::hours(9), "x marks"));
    h.store.inner().insert(row(2, day(1) + ChronoDuration::hours(10), "x again"));
    h.store
        .fail_fetch_within(DateRange::new(day(2), day(3)));

    let (outcome, events, _, exporter) = run_collecting(h).await;

    match &outcome {
        JobOutcome::Failed { rows, export_path, .. } => {
            assert_eq!(*rows, 2, "rows from the chunk before the failure are retained");
            assert!(export_path.is_some(), "partial rows are exported, not discarded");
        }
        other => panic!("expected Failed, got {other:?}"),
    }
    assert_eq!(exporter.export_count(), 1);
    assert_eq!(exporter.last_export().unwrap().0, 2);

    let terminal_idx = events.len() - 1;
    assert!(events[terminal_idx].is_terminal());
    assert!(
        matches!(events[terminal_idx - 1], ProgressEvent::Error { .. }),
        "the query error is the last non-terminal event"
    );
}

// Scenario C: a chunk returns exactly `cap` rows — the cap flag trips, a
// warning names the sub-range, and the job still completes.
#[tokio::test]
async fn scenario_c_cap_hit_warns_but_completes() {
    let mut req = request(1, 2);
    req.adaptive = false;
    req.chunk_days_hint = 1;
    req.row_cap = 100;
    let h = harness(req);

    for i in 0..100 {
        h.store
            .inner()
            .insert(row(i, day(1) + ChronoDuration::minutes(i), "x"));
    }
    h.store.inner().insert(row(500, day(2) + ChronoDuration::hours(1), "x"));

    let (outcome, events, _, _) = run_collecting(h).await;

    match &outcome {
        JobOutcome::Completed { rows, .. } => assert_eq!(*rows, 101),
        other => panic!("expected Completed, got {other:?}"),
    }

    let warnings: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Warning {
                chunk_start,
                chunk_end,
                ..
            } => Some((*chunk_start, *chunk_end)),
            _ => None,
        })
        .collect();
    assert_eq!(warnings, vec![(day(1), day(2))], "warning names the capped sub-range");
}

// One row below the cap must not trip the flag.
#[tokio::test]
async fn cap_minus_one_rows_do_not_warn() {
    let mut req = request(1, 1);
    req.adaptive = false;
    req.chunk_days_hint = 1;
    req.row_cap = 100;
    let h = harness(req);

    for i in 0..99 {
        h.store
            .inner()
            .insert(row(i, day(1) + ChronoDuration::minutes(i), "x"));
    }

    let (outcome, events, _, _) = run_collecting(h).await;
    assert!(matches!(outcome, JobOutcome::Completed { rows: 99, .. }));
    assert!(events.iter().all(|e| !matches!(e, ProgressEvent::Warning { .. })));
}

// Cancellation before chunk N: no chunk >= N executes and the job lands
// in Cancelled with exactly the rows from chunks 1..N-1.
#[tokio::test]
async fn cancellation_at_chunk_boundary_keeps_earlier_rows() {
    let mut req = request(1, 5);
    req.adaptive = false;
    req.chunk_days_hint = 1;
    // Pin the window width so chunk boundaries stay one day apart.
    let h = harness_with(
        req,
        EngineConfig {
            chunk_days_max: 1,
            heartbeat_interval: Duration::from_millis(50),
            ..EngineConfig::default()
        },
    );

    for d in 1..=5 {
        h.store
            .inner()
            .insert(row(d as i64, day(d) + ChronoDuration::hours(12), "x"));
    }
    h.store.cancel_after_fetches(2, h.cancel.clone());

    let (outcome, _, store, exporter) = run_collecting(h).await;

    assert_eq!(store.fetch_calls(), 2, "no chunk after the cancellation point executes");
    match &outcome {
        JobOutcome::Cancelled { rows, export_path } => {
            assert_eq!(*rows, 2);
            assert!(export_path.is_some(), "partial rows are retained and exported");
        }
        other => panic!("expected Cancelled, got {other:?}"),
    }
    assert_eq!(exporter.last_export().unwrap().0, 2);
}

// Sampling that fails entirely falls back to the fixed legacy plan with
// the request's own width hint and cap.
#[tokio::test]
async fn sampling_failure_falls_back_to_legacy_plan() {
    let req = request(1, 9);
    let h = harness(req);
    h.store.fail_all_counts();

    let (outcome, events, store, _) = run_collecting(h).await;

    assert_eq!(outcome, JobOutcome::Empty);
    assert!(store.count_calls() >= 5, "all probes were attempted");

    let windows = store.fetched_windows();
    assert_eq!(window_days(&windows[0]), 3, "legacy plan starts at the 3-day hint");

    assert!(
        events.iter().any(|e| matches!(
            e,
            ProgressEvent::Log { message, .. } if message.contains("legacy")
        )),
        "fallback is announced on the channel"
    );
}

// An unreachable store fails the job in Planning, before any chunk runs.
#[tokio::test]
async fn connectivity_failure_fails_before_any_chunk() {
    let h = harness(request(1, 5));
    h.store.fail_ping();

    let (outcome, events, store, exporter) = run_collecting(h).await;

    assert!(matches!(outcome, JobOutcome::Failed { rows: 0, .. }));
    assert_eq!(store.fetch_calls(), 0);
    assert_eq!(exporter.export_count(), 0);
    assert!(events.iter().any(|e| matches!(
        e,
        ProgressEvent::Error { message } if message.contains("timeout")
    )));
}

// Progress events carry monotonically non-decreasing percentages and end
// at 100%.
#[tokio::test]
async fn progress_percent_is_monotonic() {
    let mut req = request(1, 6);
    req.adaptive = false;
    req.chunk_days_hint = 1;
    let h = harness(req);

    for d in 1..=6 {
        h.store
            .inner()
            .insert(row(d as i64, day(d) + ChronoDuration::hours(1), "x"));
    }

    let (_, events, _, _) = run_collecting(h).await;
    let percents: Vec<f32> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Progress { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect();

    assert!(!percents.is_empty());
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*percents.last().unwrap(), 100.0);
}
