//! Database connection seam for the extraction pipeline.
//!
//! The pipeline never talks to a driver directly. It issues read-only
//! `SELECT` statements through [`SqlConnection`], which keeps the
//! catalog, filter and export logic independent of the SQL Server driver
//! and lets tests drive it with an in-memory store.
//!
//! # Module Structure
//! - `config`: Connection and export configuration
//! - `mssql`: SQL Server implementation on top of tiberius

use crate::Result;
use async_trait::async_trait;

pub mod config;

#[cfg(feature = "mssql")]
pub mod mssql;

pub use config::{CatalogFailurePolicy, ConnectionConfig, ExportConfig};

/// A single cell rendered as text; `None` is SQL `NULL`.
pub type Cell = Option<String>;

/// Fully materialized result of a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    /// Column names reported by the driver (empty when no row came back)
    pub columns: Vec<String>,
    /// Rows in the order the store returned them
    pub rows: Vec<Vec<Cell>>,
}

impl ResultSet {
    /// Creates a result set from rows.
    pub const fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { columns, rows }
    }

    /// Whether the query returned no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows returned.
    pub fn row_count(&self) -> u64 {
        u64::try_from(self.rows.len()).unwrap_or(u64::MAX)
    }
}

/// One exclusively owned, live database session.
///
/// # Contract
/// - Only read-only statements are ever issued through this trait
/// - Positional parameters are bound as `@P1`, `@P2`, ... in order
/// - Implementations must not apply their own query timeout; a hanging
///   store hangs the caller
///
/// The session is taken by `&mut self`, so the borrow checker rules out
/// concurrent use of one connection.
#[async_trait]
pub trait SqlConnection: Send {
    /// Executes a query and materializes every row as text.
    ///
    /// # Errors
    /// Returns `DbExportError::Query` if the statement cannot be executed
    /// or a value cannot be rendered.
    async fn query(&mut self, sql: &str, params: &[&str]) -> Result<ResultSet>;

    /// Releases the session.
    ///
    /// # Errors
    /// Returns `DbExportError::Connection` if the server-side close fails;
    /// the session is gone either way.
    async fn close(self) -> Result<()>
    where
        Self: Sized;

    /// Description safe for logging (no credentials).
    fn safe_description(&self) -> String;
}
