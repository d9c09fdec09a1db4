//! Export run configuration.

use super::ConnectionConfig;
use crate::{Result, error::DbExportError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Schemas exported when none are configured.
pub const DEFAULT_SCHEMAS: [&str; 3] = ["Production", "Sales", "Person"];

/// Output directory used when none is configured.
pub const DEFAULT_OUTPUT_ROOT: &str = "data";

/// What to do when the table list of a schema cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogFailurePolicy {
    /// Stop the whole run; later schemas are not attempted
    #[default]
    AbortRun,
    /// Record the failure and continue with the next schema
    SkipSchema,
}

/// Everything the orchestrator needs for one run.
///
/// Passed explicitly instead of living in process-wide state.
///
/// # Example
/// ```rust
/// use dbexport_core::adapters::{CatalogFailurePolicy, ExportConfig};
///
/// let config = ExportConfig::new()
///     .with_schemas(vec!["Person".to_string()])
///     .with_output_root("exports".into())
///     .with_catalog_failure_policy(CatalogFailurePolicy::SkipSchema);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Schemas to export, processed in this order
    pub schemas: Vec<String>,
    /// Root directory; files land in `{output_root}/{schema}/{table}.csv`
    pub output_root: PathBuf,
    /// Connection settings (no credentials)
    pub connection: ConnectionConfig,
    /// Handling of schema-level catalog failures
    pub catalog_failure_policy: CatalogFailurePolicy,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            schemas: DEFAULT_SCHEMAS.iter().map(ToString::to_string).collect(),
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            connection: ConnectionConfig::default(),
            catalog_failure_policy: CatalogFailurePolicy::default(),
        }
    }
}

impl ExportConfig {
    /// Creates a configuration with default schemas and output root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the schemas to export.
    pub fn with_schemas(mut self, schemas: Vec<String>) -> Self {
        self.schemas = schemas;
        self
    }

    /// Sets the output root directory.
    pub fn with_output_root(mut self, output_root: PathBuf) -> Self {
        self.output_root = output_root;
        self
    }

    /// Sets the connection settings.
    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }

    /// Sets the catalog failure policy.
    pub fn with_catalog_failure_policy(mut self, policy: CatalogFailurePolicy) -> Self {
        self.catalog_failure_policy = policy;
        self
    }

    /// Validates the run configuration.
    ///
    /// Schema names become directory names, so they must be non-empty and
    /// must not contain path separators or be `.`/`..`.
    ///
    /// # Errors
    /// Returns a configuration error describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.schemas.is_empty() {
            return Err(DbExportError::configuration(
                "at least one schema must be configured",
            ));
        }

        for (index, schema) in self.schemas.iter().enumerate() {
            if !is_safe_path_component(schema) {
                return Err(DbExportError::configuration(format!(
                    "schema name '{}' cannot be used as a directory name",
                    schema
                )));
            }
            if self.schemas.iter().take(index).any(|s| s == schema) {
                return Err(DbExportError::configuration(format!(
                    "schema '{}' is listed more than once",
                    schema
                )));
            }
        }

        if self.output_root.as_os_str().is_empty() {
            return Err(DbExportError::configuration("output root cannot be empty"));
        }

        self.connection.validate()
    }
}

/// Whether `name` can be used as a single path component.
pub(crate) fn is_safe_path_component(name: &str) -> bool {
    !name.trim().is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_config_defaults() {
        let config = ExportConfig::default();
        assert_eq!(config.schemas, ["Production", "Sales", "Person"]);
        assert_eq!(config.output_root, PathBuf::from("data"));
        assert_eq!(config.catalog_failure_policy, CatalogFailurePolicy::AbortRun);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_export_config_rejects_bad_schemas() {
        assert!(ExportConfig::new().with_schemas(Vec::new()).validate().is_err());

        for bad in ["", " ", ".", "..", "dbo/extra", "a\\b"] {
            let config = ExportConfig::new().with_schemas(vec![bad.to_string()]);
            assert!(config.validate().is_err(), "accepted schema {:?}", bad);
        }

        let duplicated = ExportConfig::new().with_schemas(vec![
            "Sales".to_string(),
            "Person".to_string(),
            "Sales".to_string(),
        ]);
        assert!(duplicated.validate().is_err());
    }

    #[test]
    fn test_export_config_rejects_empty_output_root() {
        let config = ExportConfig::new().with_output_root(PathBuf::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_safe_path_component() {
        assert!(is_safe_path_component("SalesOrderHeader"));
        assert!(is_safe_path_component("Order Details"));
        assert!(!is_safe_path_component("../etc"));
        assert!(!is_safe_path_component(".."));
    }
}
