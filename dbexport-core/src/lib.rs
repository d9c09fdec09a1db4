//! Schema-aware extraction of SQL Server tables into CSV files.
//!
//! This crate enumerates the base tables of a fixed list of schemas,
//! drops columns whose types have no faithful text form, and writes each
//! remaining table to `{output_root}/{schema}/{table}.csv`.
//!
//! # Security
//! - Only read-only `SELECT` statements are issued
//! - Credentials are held in zeroizing storage and never logged
//! - Driver errors are sanitized before they reach logs or reports
//!
//! # Example
//! ```rust,no_run
//! # #[cfg(feature = "mssql")]
//! # async fn example() -> dbexport_core::Result<()> {
//! use dbexport_core::adapters::{ConnectionConfig, ExportConfig};
//! use dbexport_core::adapters::mssql::MssqlConnection;
//! use dbexport_core::{Orchestrator, security::Credentials};
//!
//! let connection = ConnectionConfig::new("localhost".to_string())
//!     .with_database("AdventureWorks".to_string());
//! let credentials = Credentials::new("reader".to_string(), Some("secret".to_string()));
//! let conn = MssqlConnection::connect(&connection, &credentials).await?;
//!
//! let mut orchestrator = Orchestrator::new(ExportConfig::new().with_connection(connection));
//! let report = orchestrator.run_scoped(conn).await?;
//! println!("{} tables written", report.summary.written);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod catalog;
pub mod error;
pub mod export;
pub mod filter;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod report;
pub mod security;

pub use error::{DbExportError, Result};
pub use logging::init_logging;
pub use models::{ColumnSet, ExportOutcome, FailureKind, TableDescriptor, TableFailure};
pub use orchestrator::{ExportObserver, Orchestrator, TracingObserver};
pub use report::{RunReport, RunSummary};
