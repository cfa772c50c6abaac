//! Trait seams of the engine.
//!
//! - [`MessageStore`]: the range-count and range-fetch capability the
//!   engine requires of the underlying table.
//! - [`ResultExporter`]: consumes the accumulated row set on completion.
//! - [`ChunkStrategy`]: the planned vs. adaptive chunking capability,
//!   selected once at job start.

pub mod exporter;
pub mod store;
pub mod strategy;

pub use exporter::ResultExporter;
pub use store::MessageStore;
pub use strategy::ChunkStrategy;
