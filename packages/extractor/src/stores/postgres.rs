//! PostgreSQL store over the `msg_message` table.
//!
//! The predicate is built once per call with positional placeholders and
//! every keyword bound as a parameter; nothing user-supplied is ever
//! interpolated into the SQL text.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::debug;

use crate::error::StoreError;
use crate::traits::store::MessageStore;
use crate::types::plan::DateRange;
use crate::types::row::MessageRow;

const COLUMNS: &str = r#"id, created_at, content, conversation_id, "trigger", user_id"#;

/// PostgreSQL-backed message store.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect with a fresh pool. Connection failures come back with the
    /// cause classified (auth vs. timeout vs. DNS vs. TLS vs. unknown).
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(classify_sqlx)?;
        Ok(Self { pool })
    }

    /// Reuse an existing pool (e.g. the server's).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MessageStore for PostgresStore {
    async fn count(&self, keywords: &[String], window: DateRange) -> Result<i64, StoreError> {
        let sql = count_sql(keywords.len());
        let mut query = sqlx::query_scalar::<_, i64>(&sql)
            .bind(window.start)
            .bind(window.end);
        for kw in keywords {
            query = query.bind(format!("%{kw}%"));
        }
        let count = query.fetch_one(&self.pool).await.map_err(query_error)?;
        debug!(start = %window.start, end = %window.end, count, "count query");
        Ok(count)
    }

    async fn fetch(
        &self,
        keywords: &[String],
        window: DateRange,
        cap: u32,
    ) -> Result<Vec<MessageRow>, StoreError> {
        let sql = fetch_sql(keywords.len());
        let mut query = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(window.start)
            .bind(window.end);
        for kw in keywords {
            query = query.bind(format!("%{kw}%"));
        }
        let rows = query
            .bind(i64::from(cap))
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)?;
        debug!(start = %window.start, end = %window.end, rows = rows.len(), "fetch query");
        Ok(rows)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(classify_sqlx)?;
        Ok(())
    }
}

/// WHERE clause shared by count and fetch. `$1`/`$2` are the half-open
/// window bounds, `$3..` the keyword patterns.
fn where_sql(keyword_count: usize) -> String {
    let keyword_clauses = (0..keyword_count)
        .map(|i| format!("content ILIKE ${}", i + 3))
        .collect::<Vec<_>>()
        .join(" OR ");
    format!(
        "created_at >= $1 AND created_at < $2 \
         AND ({keyword_clauses}) \
         AND \"trigger\" = 2 AND deleted_at IS NULL"
    )
}

fn count_sql(keyword_count: usize) -> String {
    format!(
        "SELECT COUNT(*) FROM msg_message WHERE {}",
        where_sql(keyword_count)
    )
}

fn fetch_sql(keyword_count: usize) -> String {
    format!(
        "SELECT {COLUMNS} FROM msg_message WHERE {} ORDER BY created_at, id LIMIT ${}",
        where_sql(keyword_count),
        keyword_count + 3
    )
}

/// Map a sqlx error onto the connectivity taxonomy.
fn classify_sqlx(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Tls(e) => StoreError::Tls(e.to_string()),
        sqlx::Error::PoolTimedOut => StoreError::Timeout("connection pool timed out".into()),
        sqlx::Error::Database(db) => {
            let code = db.code().map(|c| c.to_string());
            classify_parts(code.as_deref(), &db.to_string())
        }
        _ => classify_parts(None, &err.to_string()),
    }
}

/// Same classification, but anything unrecognized is a plain query
/// failure rather than an unknown connectivity problem.
fn query_error(err: sqlx::Error) -> StoreError {
    match classify_sqlx(err) {
        StoreError::Unknown(msg) => StoreError::Query(msg),
        other => other,
    }
}

fn classify_parts(code: Option<&str>, message: &str) -> StoreError {
    // 28000 invalid_authorization_specification, 28P01 invalid_password.
    if matches!(code, Some("28000") | Some("28P01")) {
        return StoreError::Auth(message.to_string());
    }
    let lower = message.to_lowercase();
    if lower.contains("password") || lower.contains("authentication") {
        StoreError::Auth(message.to_string())
    } else if lower.contains("timed out") || lower.contains("timeout") {
        StoreError::Timeout(message.to_string())
    } else if lower.contains("name or service not known")
        || lower.contains("failed to lookup address")
        || lower.contains("no such host")
    {
        StoreError::Dns(message.to_string())
    } else if lower.contains("tls") || lower.contains("ssl") || lower.contains("certificate") {
        StoreError::Tls(message.to_string())
    } else {
        StoreError::Unknown(message.to_string())
    }
}
