//! Test doubles for the engine's collaborators.
//!
//! `ScriptedStore` wraps the in-memory store with failure injection and
//! call recording; `MockExporter` records exports without touching the
//! filesystem. Used by the crate's own tests and by downstream test
//! suites.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::{ExportError, StoreError};
use crate::stores::memory::MemoryStore;
use crate::traits::exporter::ResultExporter;
use crate::traits::store::MessageStore;
use crate::types::plan::DateRange;
use crate::types::row::MessageRow;

/// Build a live row with message class 2.
pub fn row(id: i64, created_at: DateTime<Utc>, content: &str) -> MessageRow {
    MessageRow {
        id,
        created_at,
        content: content.to_string(),
        conversation_id: None,
        trigger: 2,
        user_id: None,
    }
}

/// In-memory store with scripted failures.
#[derive(Default)]
pub struct ScriptedStore {
    inner: MemoryStore,
    fail_fetch_within: Mutex<Vec<DateRange>>,
    fail_counts: AtomicBool,
    fail_ping: AtomicBool,
    count_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    fetched_windows: Mutex<Vec<DateRange>>,
    cancel_after_fetch: Mutex<Option<(usize, CancellationToken)>>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed data through the wrapped store.
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Any fetch whose window intersects `range` fails with a query error.
    pub fn fail_fetch_within(&self, range: DateRange) {
        self.fail_fetch_within.lock().unwrap().push(range);
    }

    /// Every count probe fails (sampling falls back entirely).
    pub fn fail_all_counts(&self) {
        self.fail_counts.store(true, Ordering::SeqCst);
    }

    /// The connectivity preflight fails.
    pub fn fail_ping(&self) {
        self.fail_ping.store(true, Ordering::SeqCst);
    }

    /// Trip `token` as soon as `n` fetches have completed, so the next
    /// chunk boundary observes cancellation deterministically.
    pub fn cancel_after_fetches(&self, n: usize, token: CancellationToken) {
        *self.cancel_after_fetch.lock().unwrap() = Some((n, token));
    }

    pub fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Windows fetched so far, in call order.
    pub fn fetched_windows(&self) -> Vec<DateRange> {
        self.fetched_windows.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageStore for ScriptedStore {
    async fn count(&self, keywords: &[String], window: DateRange) -> Result<i64, StoreError> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_counts.load(Ordering::SeqCst) {
            return Err(StoreError::Query("scripted count failure".into()));
        }
        self.inner.count(keywords, window).await
    }

    async fn fetch(
        &self,
        keywords: &[String],
        window: DateRange,
        cap: u32,
    ) -> Result<Vec<MessageRow>, StoreError> {
        let calls = self.fetch_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.fetched_windows.lock().unwrap().push(window);

        let should_fail = self
            .fail_fetch_within
            .lock()
            .unwrap()
            .iter()
            .any(|r| r.intersects(&window));
        if should_fail {
            return Err(StoreError::Query("scripted fetch failure".into()));
        }

        let rows = self.inner.fetch(keywords, window, cap).await;

        if let Some((n, token)) = self.cancel_after_fetch.lock().unwrap().as_ref() {
            if calls >= *n {
                token.cancel();
            }
        }
        rows
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.fail_ping.load(Ordering::SeqCst) {
            return Err(StoreError::Timeout("scripted connection timeout".into()));
        }
        Ok(())
    }
}

/// Exporter that records calls instead of writing files.
#[derive(Default)]
pub struct MockExporter {
    exports: Mutex<Vec<(usize, String)>>,
    fail_next: AtomicBool,
}

impl MockExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next export call fail.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn export_count(&self) -> usize {
        self.exports.lock().unwrap().len()
    }

    /// Row count and file name of the most recent export.
    pub fn last_export(&self) -> Option<(usize, String)> {
        self.exports.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ResultExporter for MockExporter {
    async fn export(&self, rows: &[MessageRow], file_name: &str) -> Result<PathBuf, ExportError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ExportError::Rejected("scripted export failure".into()));
        }
        self.exports
            .lock()
            .unwrap()
            .push((rows.len(), file_name.to_string()));
        Ok(PathBuf::from("mock-exports").join(file_name))
    }
}
