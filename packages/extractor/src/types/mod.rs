//! Domain types for the extraction engine.

pub mod config;
pub mod plan;
pub mod progress;
pub mod request;
pub mod row;

pub use config::EngineConfig;
pub use plan::{ChunkPlan, ChunkResult, DateRange, DensityModel, PlannedChunk, SampleStat};
pub use progress::{JobOutcome, JobStatus, ProgressEvent};
pub use request::SearchRequest;
pub use row::MessageRow;
