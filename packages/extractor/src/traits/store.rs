//! The store-query capability the engine is written against.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::plan::DateRange;
use crate::types::row::MessageRow;

/// Range-count and range-fetch over a single time-ordered message table.
///
/// Implementations apply the full search predicate: date-range membership
/// (half-open `[start, end)`), case-insensitive substring match on content
/// for ANY of the keywords, and the fixed validity condition (row not
/// soft-deleted, row of the expected message class).
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Count rows matching the predicate inside `window`.
    async fn count(&self, keywords: &[String], window: DateRange) -> Result<i64, StoreError>;

    /// Fetch up to `cap` rows matching the predicate inside `window`,
    /// ordered by creation time. A single bounded query: no internal
    /// pagination.
    async fn fetch(
        &self,
        keywords: &[String],
        window: DateRange,
        cap: u32,
    ) -> Result<Vec<MessageRow>, StoreError>;

    /// Cheap connectivity check used as the job's preflight.
    async fn ping(&self) -> Result<(), StoreError>;
}
