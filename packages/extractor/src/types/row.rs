//! The row shape extracted from the `msg_message` table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One message row as returned by the store.
///
/// Column order matches the export header: id, created_at, content,
/// conversation_id, trigger, user_id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MessageRow {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub content: String,
    pub conversation_id: Option<i64>,
    pub trigger: i32,
    pub user_id: Option<i64>,
}

impl MessageRow {
    /// Export column names, in output order.
    pub const COLUMNS: [&'static str; 6] = [
        "id",
        "created_at",
        "content",
        "conversation_id",
        "trigger",
        "user_id",
    ];
}
