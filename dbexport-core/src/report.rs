//! Machine-readable run report.
//!
//! The report mirrors what the logs already say, one entry per table in
//! processing order, and is written as pretty-printed JSON.

use crate::{
    Result,
    error::DbExportError,
    models::{ExportOutcome, TableDescriptor},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

/// Outcome of one table, as recorded in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReport {
    /// Schema name
    pub schema: String,
    /// Table name
    pub table: String,
    /// What happened to the table
    #[serde(flatten)]
    pub outcome: ExportOutcome,
}

/// A schema whose table enumeration failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaFailure {
    /// Schema name
    pub schema: String,
    /// Error message
    pub message: String,
}

/// Per-status counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Tables written to CSV
    pub written: u64,
    /// Tables without rows
    pub skipped_empty: u64,
    /// Tables with only deny-listed column types
    pub skipped_no_compatible_columns: u64,
    /// Tables whose export failed
    pub failed: u64,
    /// Data rows across all written files
    pub rows_written: u64,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Wall-clock start of the run
    pub started_at: DateTime<Utc>,
    /// Elapsed time once finished
    pub duration_ms: u64,
    /// Version of the exporter
    pub tool_version: String,
    /// Schemas requested, in processing order
    pub schemas: Vec<String>,
    /// Per-table outcomes in processing order
    pub tables: Vec<TableReport>,
    /// Schemas skipped after a catalog failure
    pub schema_failures: Vec<SchemaFailure>,
    /// Counters over `tables`
    pub summary: RunSummary,
    #[serde(skip)]
    started: Option<Instant>,
}

impl RunReport {
    /// Starts an empty report for the given schema list.
    pub fn new(schemas: Vec<String>) -> Self {
        Self {
            started_at: Utc::now(),
            duration_ms: 0,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            schemas,
            tables: Vec::new(),
            schema_failures: Vec::new(),
            summary: RunSummary::default(),
            started: Some(Instant::now()),
        }
    }

    /// Records the outcome of one table.
    pub fn record(&mut self, table: &TableDescriptor, outcome: ExportOutcome) {
        let summary = &mut self.summary;
        match &outcome {
            ExportOutcome::Written { row_count, .. } => {
                summary.written = summary.written.saturating_add(1);
                summary.rows_written = summary.rows_written.saturating_add(*row_count);
            }
            ExportOutcome::SkippedEmpty => {
                summary.skipped_empty = summary.skipped_empty.saturating_add(1);
            }
            ExportOutcome::SkippedNoCompatibleColumns => {
                summary.skipped_no_compatible_columns =
                    summary.skipped_no_compatible_columns.saturating_add(1);
            }
            ExportOutcome::Failed(_) => {
                summary.failed = summary.failed.saturating_add(1);
            }
        }

        self.tables.push(TableReport {
            schema: table.schema.clone(),
            table: table.name.clone(),
            outcome,
        });
    }

    /// Records a schema that was skipped because its catalog query failed.
    pub fn record_schema_failure(&mut self, schema: &str, error: &DbExportError) {
        self.schema_failures.push(SchemaFailure {
            schema: schema.to_string(),
            message: error.to_string(),
        });
    }

    /// Stamps the elapsed time.
    pub fn finish(&mut self) {
        if let Some(started) = self.started.take() {
            self.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        }
    }

    /// Outcome recorded for `schema.table`, if any.
    pub fn outcome_of(&self, schema: &str, table: &str) -> Option<&ExportOutcome> {
        self.tables
            .iter()
            .find(|t| t.schema == schema && t.table == table)
            .map(|t| &t.outcome)
    }

    /// Whether any table or schema failed.
    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0 || !self.schema_failures.is_empty()
    }

    /// Writes the report as pretty JSON, creating parent directories.
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| DbExportError::serialization("run report", e))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DbExportError::io(format!("create {}", parent.display()), e))?;
        }

        tokio::fs::write(path, json)
            .await
            .map_err(|e| DbExportError::io(format!("write {}", path.display()), e))
    }
}
