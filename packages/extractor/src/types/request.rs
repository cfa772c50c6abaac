//! Search request parameters and validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::plan::DateRange;

/// Narrowest chunk-size hint a request may carry.
pub const CHUNK_DAYS_MIN: i64 = 1;
/// Widest chunk-size hint a request may carry.
pub const CHUNK_DAYS_MAX: i64 = 7;

/// Parameters of one search job. Immutable once the job starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Keywords matched as case-insensitive substrings, OR'ed together.
    /// Order is preserved; duplicates are allowed.
    pub keywords: Vec<String>,

    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,

    /// Initial chunk width in days (1..=7). Only consulted by the legacy
    /// adaptive strategy; a precomputed plan sizes its own chunks.
    pub chunk_days_hint: i64,

    /// Per-chunk row cap used when the planner does not derive one.
    pub row_cap: u32,

    /// Optional stem for the export file name. Sanitized before use.
    pub output_name: Option<String>,

    /// When true (the default), the job samples density and plans chunks
    /// up front; when false it goes straight to the legacy adaptive loop.
    pub adaptive: bool,
}

impl SearchRequest {
    pub fn new(keywords: Vec<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            keywords,
            start,
            end,
            chunk_days_hint: 3,
            row_cap: 20_000,
            output_name: None,
            adaptive: true,
        }
    }

    pub fn range(&self) -> DateRange {
        DateRange::new(self.start, self.end)
    }

    /// Check every parameter. A request failing here never becomes a job.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keywords.is_empty() {
            return Err(ConfigError::NoKeywords);
        }
        for (i, kw) in self.keywords.iter().enumerate() {
            if kw.trim().is_empty() {
                return Err(ConfigError::EmptyKeyword(i));
            }
        }
        if self.start > self.end {
            return Err(ConfigError::InvertedRange);
        }
        if !(CHUNK_DAYS_MIN..=CHUNK_DAYS_MAX).contains(&self.chunk_days_hint) {
            return Err(ConfigError::ChunkHintOutOfRange(self.chunk_days_hint));
        }
        if self.row_cap == 0 {
            return Err(ConfigError::ZeroRowCap);
        }
        Ok(())
    }

    /// Destination file name for the export: the sanitized output-name
    /// hint plus a timestamp, or a default stem if no hint was given.
    pub fn export_file_name(&self, at: DateTime<Utc>) -> String {
        let timestamp = at.format("%Y%m%d_%H%M%S");
        let stem = self
            .output_name
            .as_deref()
            .map(sanitize_output_name)
            .filter(|s| !s.is_empty());
        match stem {
            Some(stem) => format!("{stem}_{timestamp}.csv"),
            None => format!("keyword_results_{timestamp}.csv"),
        }
    }
}

/// Keep alphanumerics, spaces, hyphens and underscores; drop the rest.
pub fn sanitize_output_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn request() -> SearchRequest {
        SearchRequest::new(
            vec!["smoke".into(), "smoking".into()],
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn valid_request_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn empty_keyword_list_is_rejected() {
        let mut req = request();
        req.keywords.clear();
        assert_eq!(req.validate(), Err(ConfigError::NoKeywords));
    }

    #[test]
    fn blank_keyword_is_rejected_with_position() {
        let mut req = request();
        req.keywords.push("   ".into());
        assert_eq!(req.validate(), Err(ConfigError::EmptyKeyword(2)));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let mut req = request();
        std::mem::swap(&mut req.start, &mut req.end);
        assert_eq!(req.validate(), Err(ConfigError::InvertedRange));
    }

    #[test]
    fn chunk_hint_bounds_are_enforced() {
        let mut req = request();
        req.chunk_days_hint = 0;
        assert_eq!(req.validate(), Err(ConfigError::ChunkHintOutOfRange(0)));
        req.chunk_days_hint = 8;
        assert_eq!(req.validate(), Err(ConfigError::ChunkHintOutOfRange(8)));
    }

    #[test]
    fn zero_cap_is_rejected() {
        let mut req = request();
        req.row_cap = 0;
        assert_eq!(req.validate(), Err(ConfigError::ZeroRowCap));
    }

    #[test]
    fn output_name_is_sanitized() {
        assert_eq!(sanitize_output_name("q1 report/..\\x"), "q1 reportx");
        assert_eq!(sanitize_output_name("  <>:| "), "");
    }

    #[test]
    fn export_file_name_uses_hint_and_timestamp() {
        let mut req = request();
        req.output_name = Some("march audit".into());
        let at = Utc.with_ymd_and_hms(2024, 3, 12, 9, 30, 0).unwrap();
        assert_eq!(req.export_file_name(at), "march audit_20240312_093000.csv");
    }

    #[test]
    fn export_file_name_defaults_without_hint() {
        let at = Utc.with_ymd_and_hms(2024, 3, 12, 9, 30, 0).unwrap();
        assert_eq!(
            request().export_file_name(at),
            "keyword_results_20240312_093000.csv"
        );
    }

    #[test]
    fn unusable_hint_falls_back_to_default_stem() {
        let mut req = request();
        req.output_name = Some("///".into());
        let at = Utc.with_ymd_and_hms(2024, 3, 12, 9, 30, 0).unwrap();
        assert!(req.export_file_name(at).starts_with("keyword_results_"));
    }
}
