#![feature(int_roundings)]
//! Adaptive chunked keyword extraction over a time-ordered message table.
//!
//! Extracts every row matching a keyword filter from a large table over an
//! arbitrary date range without exceeding per-query row limits, while
//! reporting live progress and honoring cancellation.
//!
//! # How a job runs
//!
//! 1. The [`sampler`] probes the range and estimates row density.
//! 2. The [`planner`] partitions the range into chunks sized inversely to
//!    density (or falls back to the legacy runtime-tuned loop).
//! 3. The [`runner`] executes each chunk as one bounded query via the
//!    [`executor`], accumulating rows and publishing events on the job's
//!    [`progress`] channel.
//! 4. On any terminal state the accumulated rows go to the
//!    [`ResultExporter`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use extractor::{CsvExporter, EngineConfig, EngineDeps, JobRegistry, PostgresStore, SearchRequest};
//!
//! let registry = JobRegistry::new(EngineDeps {
//!     store: Arc::new(PostgresStore::connect(&database_url).await?),
//!     exporter: Arc::new(CsvExporter::new("exports")),
//!     config: EngineConfig::default(),
//! });
//!
//! let job_id = registry.submit(SearchRequest::new(keywords, start, end))?;
//! let mut events = registry.subscribe(job_id).unwrap();
//! while let Some(event) = events.next().await {
//!     println!("{event:?}");
//! }
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Core trait seams (store, exporter, chunk strategy)
//! - [`types`] - Domain types and engine configuration
//! - [`sampler`] / [`planner`] / [`executor`] / [`runner`] - The engine
//! - [`progress`] - Per-job event channel
//! - [`registry`] - Job registry handle for the API layer
//! - [`stores`] - Store implementations (Postgres, in-memory)
//! - [`export`] - CSV exporter
//! - [`testing`] - Scripted doubles for tests

pub mod error;
pub mod executor;
pub mod export;
pub mod planner;
pub mod progress;
pub mod registry;
pub mod runner;
pub mod sampler;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export the surface the API layer works with.
pub use error::{ConfigError, ExportError, ExtractError, StoreError};
pub use export::CsvExporter;
pub use progress::{ProgressChannel, ProgressStream};
pub use registry::{CancelOutcome, JobRegistry, JobSnapshot};
pub use runner::{EngineDeps, JobLifecycle, JobRunner};
pub use stores::{MemoryStore, PostgresStore};
pub use traits::{ChunkStrategy, MessageStore, ResultExporter};
pub use types::{
    ChunkPlan, ChunkResult, DateRange, DensityModel, EngineConfig, JobOutcome, JobStatus,
    MessageRow, PlannedChunk, ProgressEvent, SampleStat, SearchRequest,
};
