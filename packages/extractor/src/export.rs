//! CSV result exporter.
//!
//! Writes the accumulated row set as a spreadsheet-compatible CSV file
//! under a configured directory. The whole file is rendered in memory
//! first — the engine already holds the full row set, so this adds one
//! encoded copy, within the same resource tradeoff.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use crate::error::ExportError;
use crate::traits::exporter::ResultExporter;
use crate::types::row::MessageRow;

/// Exporter that writes one CSV file per job into `dir`.
pub struct CsvExporter {
    dir: PathBuf,
}

impl CsvExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

#[async_trait]
impl ResultExporter for CsvExporter {
    async fn export(&self, rows: &[MessageRow], file_name: &str) -> Result<PathBuf, ExportError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(file_name);

        let mut out = String::with_capacity(64 * (rows.len() + 1));
        out.push_str(&MessageRow::COLUMNS.join(","));
        out.push('\n');
        for row in rows {
            push_record(&mut out, row);
        }

        tokio::fs::write(&path, out).await?;
        info!(path = %path.display(), rows = rows.len(), "wrote export file");
        Ok(path)
    }
}

fn push_record(out: &mut String, row: &MessageRow) {
    out.push_str(&row.id.to_string());
    out.push(',');
    out.push_str(&row.created_at.to_rfc3339());
    out.push(',');
    out.push_str(&escape(&row.content));
    out.push(',');
    if let Some(id) = row.conversation_id {
        out.push_str(&id.to_string());
    }
    out.push(',');
    out.push_str(&row.trigger.to_string());
    out.push(',');
    if let Some(id) = row.user_id {
        out.push_str(&id.to_string());
    }
    out.push('\n');
}

/// Quote a field when it contains a separator, quote, or newline;
/// embedded quotes are doubled.
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
