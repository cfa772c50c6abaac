//! HTTP routes: submit, list, subscribe (SSE), cancel.
//!
//! The SSE endpoint bridges a job's progress stream straight onto the
//! response; heartbeats from idle reads keep intermediaries from timing
//! the connection out, and the terminal event closes the stream.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use extractor::{CancelOutcome, JobRegistry, ProgressStream, SearchRequest};

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: JobRegistry,
}

/// Build the axum router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/searches", post(submit_search).get(list_searches))
        .route("/api/searches/{id}/events", get(search_events))
        .route("/api/searches/{id}/cancel", post(cancel_search))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Request body for submitting a search.
#[derive(Debug, Deserialize)]
pub struct SubmitSearch {
    pub keywords: Vec<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default = "default_chunk_days")]
    pub chunk_days: i64,
    #[serde(default = "default_limit_per_chunk")]
    pub limit_per_chunk: u32,
    #[serde(default)]
    pub export_filename: Option<String>,
    #[serde(default = "default_true")]
    pub auto_optimize: bool,
}

fn default_chunk_days() -> i64 {
    3
}

fn default_limit_per_chunk() -> u32 {
    20_000
}

fn default_true() -> bool {
    true
}

impl From<SubmitSearch> for SearchRequest {
    fn from(body: SubmitSearch) -> Self {
        SearchRequest {
            keywords: body.keywords,
            start: body.start,
            end: body.end,
            chunk_days_hint: body.chunk_days,
            row_cap: body.limit_per_chunk,
            output_name: body.export_filename.filter(|s| !s.trim().is_empty()),
            adaptive: body.auto_optimize,
        }
    }
}

async fn submit_search(
    State(state): State<AppState>,
    Json(body): Json<SubmitSearch>,
) -> Response {
    match state.registry.submit(body.into()) {
        Ok(job_id) => (
            StatusCode::ACCEPTED,
            Json(json!({ "status": "started", "job_id": job_id })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

async fn list_searches(State(state): State<AppState>) -> Response {
    Json(state.registry.list()).into_response()
}

/// SSE stream of a job's progress events.
async fn search_events(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.registry.subscribe(id) {
        Some(stream) => Sse::new(event_stream(stream))
            .keep_alive(KeepAlive::default())
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "not_found" })),
        )
            .into_response(),
    }
}

async fn cancel_search(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.registry.cancel(id) {
        CancelOutcome::Requested => {
            Json(json!({ "status": "cancellation_requested" })).into_response()
        }
        CancelOutcome::NotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "not_found" })),
        )
            .into_response(),
    }
}

/// Adapt a progress stream to SSE events. The stream ends after the
/// terminal event, which closes the response.
fn event_stream(stream: ProgressStream) -> impl Stream<Item = Result<Event, Infallible>> {
    futures::stream::unfold(stream, |mut stream| async move {
        let event = stream.next().await?;
        let payload = serde_json::to_value(&event).unwrap_or_default();
        let sse = Event::default().event(event.kind()).data(payload.to_string());
        Some((Ok(sse), stream))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::TimeZone;
    use extractor::testing::MockExporter;
    use extractor::{EngineConfig, EngineDeps, MemoryStore};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::util::ServiceExt;

    fn app() -> Router {
        let registry = JobRegistry::new(EngineDeps {
            store: Arc::new(MemoryStore::new()),
            exporter: Arc::new(MockExporter::new()),
            config: EngineConfig {
                heartbeat_interval: Duration::from_millis(50),
                ..EngineConfig::default()
            },
        });
        router(AppState { registry })
    }

    fn submit_body(keywords: &[&str]) -> String {
        json!({
            "keywords": keywords,
            "start": "2024-03-01T00:00:00Z",
            "end": "2024-03-04T00:00:00Z",
        })
        .to_string()
    }

    #[test]
    fn submit_body_maps_onto_request() {
        let body = SubmitSearch {
            keywords: vec!["smoke".into()],
            start: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap(),
            chunk_days: 2,
            limit_per_chunk: 500,
            export_filename: Some("  ".into()),
            auto_optimize: false,
        };
        let request: SearchRequest = body.into();
        assert_eq!(request.chunk_days_hint, 2);
        assert_eq!(request.row_cap, 500);
        assert_eq!(request.output_name, None, "blank hints are dropped");
        assert!(!request.adaptive);
    }

    #[tokio::test]
    async fn submit_returns_accepted_with_job_id() {
        let response = app()
            .oneshot(
                Request::post("/api/searches")
                    .header("content-type", "application/json")
                    .body(Body::from(submit_body(&["x"])))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn invalid_submit_is_unprocessable() {
        let response = app()
            .oneshot(
                Request::post("/api/searches")
                    .header("content-type", "application/json")
                    .body(Body::from(submit_body(&[])))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn unknown_job_events_are_not_found() {
        let response = app()
            .oneshot(
                Request::get(format!("/api/searches/{}/events", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cancel_unknown_job_is_not_found() {
        let response = app()
            .oneshot(
                Request::post(format!("/api/searches/{}/cancel", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_starts_empty() {
        let response = app()
            .oneshot(Request::get("/api/searches").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
