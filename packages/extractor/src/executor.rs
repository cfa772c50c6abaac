//! Range query execution.
//!
//! Runs one planned chunk as a single bounded query and annotates the
//! outcome: elapsed time, whether the row cap was hit (the sub-range may
//! be incomplete), and whether the result was sparse. No retry happens
//! here — a failure is surfaced verbatim to the job runner.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{ExtractError, StoreError};
use crate::traits::store::MessageStore;
use crate::types::plan::{ChunkResult, PlannedChunk};

/// A chunk query failure, annotated with how long the query ran.
#[derive(Debug)]
pub struct ChunkFailure {
    pub source: StoreError,
    pub elapsed: Duration,
}

impl From<ChunkFailure> for ExtractError {
    fn from(failure: ChunkFailure) -> Self {
        ExtractError::Query {
            source: failure.source,
            elapsed: failure.elapsed,
        }
    }
}

/// Execute `chunk` against the store.
///
/// `cap_hit` is set when the fetch returns exactly `cap` rows; `sparse`
/// when it returns more than zero but fewer than `min_rows` (the signal
/// the adaptive strategy treats as "fast").
pub async fn run_chunk<S>(
    store: &S,
    keywords: &[String],
    chunk: &PlannedChunk,
    cap: u32,
    min_rows: usize,
) -> Result<ChunkResult, ChunkFailure>
where
    S: MessageStore + ?Sized,
{
    let started = Instant::now();
    debug!(
        start = %chunk.start,
        end = %chunk.end,
        days = chunk.days(),
        cap,
        "executing chunk query"
    );

    let rows = store
        .fetch(keywords, chunk.range(), cap)
        .await
        .map_err(|source| ChunkFailure {
            source,
            elapsed: started.elapsed(),
        })?;

    let elapsed = started.elapsed();
    let cap_hit = rows.len() == cap as usize;
    let sparse = !rows.is_empty() && rows.len() < min_rows;

    debug!(
        start = %chunk.start,
        end = %chunk.end,
        rows = rows.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        cap_hit,
        sparse,
        "chunk query finished"
    );

    Ok(ChunkResult {
        rows,
        elapsed,
        cap_hit,
        sparse,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::memory::MemoryStore;
    use crate::types::plan::DateRange;
    use crate::types::row::MessageRow;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    fn seed(store: &MemoryStore, count: i64) {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        for i in 0..count {
            store.insert(MessageRow {
                id: i,
                created_at: start + ChronoDuration::seconds(i),
                content: "smoke detected".into(),
                conversation_id: None,
                trigger: 2,
                user_id: None,
            });
        }
    }

    fn chunk() -> PlannedChunk {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        PlannedChunk {
            start,
            end: start + ChronoDuration::days(1),
            estimated_rows: None,
            weekend: false,
        }
    }

    #[tokio::test]
    async fn exactly_cap_rows_sets_the_flag() {
        let store = MemoryStore::new();
        seed(&store, 100);
        let result = run_chunk(&store, &["smoke".into()], &chunk(), 100, 10)
            .await
            .unwrap();
        assert!(result.cap_hit);
        assert_eq!(result.rows.len(), 100);
    }

    #[tokio::test]
    async fn one_below_cap_does_not_set_the_flag() {
        let store = MemoryStore::new();
        seed(&store, 99);
        let result = run_chunk(&store, &["smoke".into()], &chunk(), 100, 10)
            .await
            .unwrap();
        assert!(!result.cap_hit);
        assert_eq!(result.rows.len(), 99);
    }

    #[tokio::test]
    async fn nonzero_below_minimum_is_sparse() {
        let store = MemoryStore::new();
        seed(&store, 5);
        let result = run_chunk(&store, &["smoke".into()], &chunk(), 100, 10)
            .await
            .unwrap();
        assert!(result.sparse);
    }

    #[tokio::test]
    async fn empty_result_is_not_sparse() {
        let store = MemoryStore::new();
        let result = run_chunk(&store, &["smoke".into()], &chunk(), 100, 10)
            .await
            .unwrap();
        assert!(!result.sparse);
        assert!(result.rows.is_empty());
    }

    #[test]
    fn range_checks_half_open_window() {
        let c = chunk();
        let r: DateRange = c.range();
        assert!(r.contains(c.start));
        assert!(!r.contains(c.end));
    }
}
