//! Ingestion run report
//!
//! The report is owned by the caller (the driver that enumerates input
//! files) and handed to the ingestion engine, which mutates its counters and
//! error list as the run progresses. Rendering the report to HTML or JSON
//! documents is a concern of the surrounding system; this crate only carries
//! the data and can summarize it through the logging sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// One structured error entry: which module failed, on which chunk (if the
/// failure was chunk-scoped), and an optional offending row sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEntry {
    pub module: String,
    pub chunk_index: Option<usize>,
    pub message: String,
    pub row_sample: Option<serde_json::Value>,
}

/// Statistics and diagnostics for one ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionReport {
    // Identification
    pub source_file: String,
    pub table_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    // Statistics
    pub total_chunks: usize,
    pub successful_chunks: usize,
    pub failed_chunks: usize,
    pub total_rows: u64,
    pub inserted_rows: u64,
    pub skipped_rows: u64,

    // Error details, in the order they occurred
    pub errors: Vec<ReportEntry>,

    // Was this exact file content already in the store?
    pub duplicate_import: bool,

    // Extra/missing columns observed against the expected schema
    pub schema_warnings: Vec<String>,
}

impl IngestionReport {
    pub fn new(source_file: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            source_file: source_file.into(),
            table_name: table_name.into(),
            started_at: Utc::now(),
            finished_at: None,
            total_chunks: 0,
            successful_chunks: 0,
            failed_chunks: 0,
            total_rows: 0,
            inserted_rows: 0,
            skipped_rows: 0,
            errors: Vec::new(),
            duplicate_import: false,
            schema_warnings: Vec::new(),
        }
    }

    /// Append a structured error entry. Every failure is recorded here
    /// before it propagates, so an aborted run still leaves a complete
    /// diagnostic trail.
    pub fn push_error(
        &mut self,
        module: &str,
        chunk_index: Option<usize>,
        message: impl Into<String>,
        row_sample: Option<serde_json::Value>,
    ) {
        self.errors.push(ReportEntry {
            module: module.to_string(),
            chunk_index,
            message: message.into(),
            row_sample,
        });
    }

    /// Stamp the end of the run.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn is_complete(&self) -> bool {
        self.failed_chunks == 0 && self.successful_chunks == self.total_chunks
    }

    /// Emit a run summary through the logging sink.
    pub fn log_summary(&self) {
        let status = if self.is_complete() { "SUCCESS" } else { "PARTIAL" };
        let chunks = format!("{}/{}", self.successful_chunks, self.total_chunks);
        let rows = format!("{}/{}", self.inserted_rows, self.total_rows);
        info!(
            table = %self.table_name,
            source = %self.source_file,
            status,
            chunks = %chunks,
            rows = %rows,
            skipped_rows = self.skipped_rows,
            "Ingestion report"
        );

        if self.duplicate_import {
            warn!(source = %self.source_file, "File content was already imported");
        }

        for warning in &self.schema_warnings {
            warn!(warning = %warning, "Schema warning");
        }

        for error in &self.errors {
            warn!(
                module = %error.module,
                chunk = ?error.chunk_index,
                message = %error.message,
                "Ingestion error"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_report_is_empty() {
        let report = IngestionReport::new("stats.csv.processed", "stats");
        assert_eq!(report.total_chunks, 0);
        assert_eq!(report.errors.len(), 0);
        assert!(!report.duplicate_import);
        assert!(report.finished_at.is_none());
    }

    #[test]
    fn test_push_error_preserves_order() {
        let mut report = IngestionReport::new("a.csv.processed", "a");
        report.push_error("schema", Some(0), "first", Some(json!({"age": "x"})));
        report.push_error("engine", Some(2), "second", None);

        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].message, "first");
        assert_eq!(report.errors[0].chunk_index, Some(0));
        assert_eq!(report.errors[1].module, "engine");
    }

    #[test]
    fn test_completion_logic() {
        let mut report = IngestionReport::new("a.csv.processed", "a");
        report.total_chunks = 3;
        report.successful_chunks = 3;
        assert!(report.is_complete());

        report.failed_chunks = 1;
        assert!(!report.is_complete());
    }

    #[test]
    fn test_serializes_to_json() {
        let mut report = IngestionReport::new("a.csv.processed", "a");
        report.push_error("ledger", None, "boom", None);
        report.finish();

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["source_file"], "a.csv.processed");
        assert_eq!(value["errors"][0]["module"], "ledger");
    }
}
