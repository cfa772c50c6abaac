//! In-memory store for tests and development.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::traits::store::MessageStore;
use crate::types::plan::DateRange;
use crate::types::row::MessageRow;

struct StoredMessage {
    row: MessageRow,
    deleted_at: Option<DateTime<Utc>>,
}

/// In-memory message table applying the same predicate as the Postgres
/// store: window membership, case-insensitive keyword substring, message
/// class 2, not soft-deleted. Data is lost on drop; not for production.
#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<StoredMessage>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a live row.
    pub fn insert(&self, row: MessageRow) {
        self.rows.write().unwrap().push(StoredMessage {
            row,
            deleted_at: None,
        });
    }

    /// Insert a soft-deleted row (filtered out by the validity condition).
    pub fn insert_deleted(&self, row: MessageRow, deleted_at: DateTime<Utc>) {
        self.rows.write().unwrap().push(StoredMessage {
            row,
            deleted_at: Some(deleted_at),
        });
    }

    pub fn len(&self) -> usize {
        self.rows.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.rows.write().unwrap().clear();
    }

    fn matching(&self, keywords: &[String], window: DateRange) -> Vec<MessageRow> {
        let lowered: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
        let mut rows: Vec<MessageRow> = self
            .rows
            .read()
            .unwrap()
            .iter()
            .filter(|m| m.deleted_at.is_none())
            .filter(|m| m.row.trigger == 2)
            .filter(|m| window.contains(m.row.created_at))
            .filter(|m| {
                let content = m.row.content.to_lowercase();
                lowered.iter().any(|kw| content.contains(kw))
            })
            .map(|m| m.row.clone())
            .collect();
        rows.sort_by_key(|r| (r.created_at, r.id));
        rows
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn count(&self, keywords: &[String], window: DateRange) -> Result<i64, StoreError> {
        Ok(self.matching(keywords, window).len() as i64)
    }

    async fn fetch(
        &self,
        keywords: &[String],
        window: DateRange,
        cap: u32,
    ) -> Result<Vec<MessageRow>, StoreError> {
        let mut rows = self.matching(keywords, window);
        rows.truncate(cap as usize);
        Ok(rows)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
