//! Configuration types for the extraction pipeline.
//!
//! - `ConnectionConfig`: SQL Server connection settings
//! - `ExportConfig`: schemas, output root and failure policy for a run
//!
//! # Security
//! These configuration structs intentionally do NOT store passwords.
//! Credentials live in [`crate::security::Credentials`].

mod connection;
mod export;

pub use connection::ConnectionConfig;
pub use export::{CatalogFailurePolicy, DEFAULT_OUTPUT_ROOT, DEFAULT_SCHEMAS, ExportConfig};
pub(crate) use export::is_safe_path_component;
