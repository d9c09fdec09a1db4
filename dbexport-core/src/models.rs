//! Core data models for the extraction pipeline.
//!
//! These types carry no connection state or credentials and are safe to
//! log and serialize.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::DbExportError;

/// A base table discovered in a schema.
///
/// Lives only for the duration of one export attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Schema the table belongs to
    pub schema: String,
    /// Table name as reported by the catalog
    pub name: String,
}

impl TableDescriptor {
    /// Creates a descriptor for `schema.name`.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Destination file for this table under `output_root`.
    ///
    /// Always `{output_root}/{schema}/{table}.csv`, so re-runs overwrite.
    pub fn output_path(&self, output_root: &Path) -> PathBuf {
        output_root
            .join(&self.schema)
            .join(format!("{}.csv", self.name))
    }
}

impl std::fmt::Display for TableDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Ordered column names in database-reported order.
///
/// The order becomes the CSV column order. An empty set is meaningful:
/// the table has nothing that can be exported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSet(Vec<String>);

impl ColumnSet {
    /// Wraps an already ordered list of column names.
    pub const fn new(columns: Vec<String>) -> Self {
        Self(columns)
    }

    /// Whether the table has no exportable column.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Column names in order.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Iterates the column names in order.
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }
}

impl From<Vec<String>> for ColumnSet {
    fn from(columns: Vec<String>) -> Self {
        Self(columns)
    }
}

impl<'a> IntoIterator for &'a ColumnSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Which stage of a table export failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Column metadata lookup failed
    Catalog,
    /// The projection query failed
    Query,
    /// Writing the CSV failed
    Io,
    /// Anything else (serialization, unexpected driver state)
    Other,
}

/// Serializable record of a table-level failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableFailure {
    /// Stage that failed
    pub kind: FailureKind,
    /// Sanitized error message, including its source chain
    pub message: String,
}

impl From<&DbExportError> for TableFailure {
    fn from(error: &DbExportError) -> Self {
        let kind = match error {
            DbExportError::Catalog { .. } => FailureKind::Catalog,
            DbExportError::Query { .. } => FailureKind::Query,
            DbExportError::Io { .. } => FailureKind::Io,
            _ => FailureKind::Other,
        };

        let mut message = error.to_string();
        let mut source = std::error::Error::source(error);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }

        Self { kind, message }
    }
}

impl std::fmt::Display for TableFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Result of exporting one table. Produced once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExportOutcome {
    /// A CSV file was written
    Written {
        /// Final path of the CSV file
        path: PathBuf,
        /// Number of data rows (header excluded)
        row_count: u64,
    },
    /// The table had compatible columns but no rows; no file was written
    SkippedEmpty,
    /// Every column had a deny-listed type; nothing was queried or written
    SkippedNoCompatibleColumns,
    /// The export failed; the run continues with the next table
    Failed(TableFailure),
}

impl ExportOutcome {
    /// Builds a `Failed` outcome from an error.
    pub fn failed(error: &DbExportError) -> Self {
        Self::Failed(TableFailure::from(error))
    }

    /// Short label used in logs and summaries.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Written { .. } => "Written",
            Self::SkippedEmpty => "SkippedEmpty",
            Self::SkippedNoCompatibleColumns => "SkippedNoCompatibleColumns",
            Self::Failed(_) => "Failed",
        }
    }

    /// Whether the outcome is a failure.
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}
