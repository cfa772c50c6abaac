//! The result-export collaborator interface.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::ExportError;
use crate::types::row::MessageRow;

/// Consumes the aggregated ordered row sequence when a job reaches a
/// terminal state with rows to hand over.
#[async_trait]
pub trait ResultExporter: Send + Sync {
    /// Write `rows` under `file_name` and return the full path written.
    async fn export(&self, rows: &[MessageRow], file_name: &str) -> Result<PathBuf, ExportError>;
}
