//! Typed errors for the extraction engine.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to keep failures
//! pattern-matchable at the job boundary: a request that never starts
//! (`ConfigError`), a store that cannot be reached (`StoreError` with a
//! classified cause), a chunk query that failed mid-job, or an export that
//! could not be written.

use std::time::Duration;

use thiserror::Error;

/// Top-level error for a search job.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Request parameters were invalid; the job never started.
    #[error("invalid search request: {0}")]
    Config(#[from] ConfigError),

    /// The store was unreachable during the preflight check. Fatal, no retry.
    #[error("store unreachable: {0}")]
    Connectivity(#[source] StoreError),

    /// A single chunk's query failed. Fatal to the whole job: a visibly
    /// incomplete job beats silently missing ranges.
    #[error("chunk query failed after {elapsed:?}: {source}")]
    Query {
        #[source]
        source: StoreError,
        elapsed: Duration,
    },

    /// Writing the result file failed.
    #[error("export failed: {0}")]
    Export(#[from] ExportError),
}

/// Validation failures on a [`SearchRequest`](crate::types::SearchRequest).
///
/// Surfaced immediately on submission; a job with any of these never spawns.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one keyword is required")]
    NoKeywords,

    #[error("keyword at position {0} is empty")]
    EmptyKeyword(usize),

    #[error("start instant is after end instant")]
    InvertedRange,

    #[error("chunk-size hint {0} is outside 1..=7 days")]
    ChunkHintOutOfRange(i64),

    #[error("per-chunk row cap must be positive")]
    ZeroRowCap,
}

/// Errors surfaced by a [`MessageStore`](crate::traits::MessageStore)
/// implementation.
///
/// Connectivity causes are classified so the caller can report auth vs.
/// timeout vs. DNS vs. TLS distinctly instead of one opaque string.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("connection timed out: {0}")]
    Timeout(String),

    #[error("hostname resolution failed: {0}")]
    Dns(String),

    #[error("TLS negotiation failed: {0}")]
    Tls(String),

    /// The store accepted the connection but the query itself failed.
    #[error("query failed: {0}")]
    Query(String),

    #[error("store error: {0}")]
    Unknown(String),
}

impl StoreError {
    /// True for causes that mean the store itself cannot be reached,
    /// as opposed to a single query going wrong.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            StoreError::Auth(_) | StoreError::Timeout(_) | StoreError::Dns(_) | StoreError::Tls(_)
        )
    }

    /// Short cause label used in log fields and progress events.
    pub fn cause(&self) -> &'static str {
        match self {
            StoreError::Auth(_) => "auth",
            StoreError::Timeout(_) => "timeout",
            StoreError::Dns(_) => "dns",
            StoreError::Tls(_) => "tls",
            StoreError::Query(_) => "query",
            StoreError::Unknown(_) => "unknown",
        }
    }
}

/// Errors from the result exporter.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write export file: {0}")]
    Io(#[from] std::io::Error),

    #[error("export rejected: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_classification() {
        assert!(StoreError::Auth("bad password".into()).is_connectivity());
        assert!(StoreError::Dns("no such host".into()).is_connectivity());
        assert!(!StoreError::Query("syntax error".into()).is_connectivity());
        assert!(!StoreError::Unknown("??".into()).is_connectivity());
    }

    #[test]
    fn cause_labels_are_stable() {
        assert_eq!(StoreError::Tls("handshake".into()).cause(), "tls");
        assert_eq!(StoreError::Timeout("10s".into()).cause(), "timeout");
    }
}
