//! Column compatibility filtering.
//!
//! Some SQL Server types have no faithful plain-text form without a
//! dedicated codec. Columns of those types are dropped from every export,
//! for every table, with no per-table overrides.

use crate::{
    Result,
    adapters::SqlConnection,
    models::{ColumnSet, TableDescriptor},
};
use tracing::debug;

/// Declared data types that are never exported.
pub const DENIED_TYPES: [&str; 5] = ["geometry", "geography", "xml", "hierarchyid", "sql_variant"];

/// Lists the exportable `COLUMN_NAME`s of table `@P1.@P2` in declaration
/// order.
///
/// The deny list is applied by the server, so matching follows the
/// database collation.
pub const LIST_COLUMNS_SQL: &str = "SELECT COLUMN_NAME \
     FROM INFORMATION_SCHEMA.COLUMNS \
     WHERE TABLE_SCHEMA = @P1 AND TABLE_NAME = @P2 \
     AND DATA_TYPE NOT IN ('geometry', 'geography', 'xml', 'hierarchyid', 'sql_variant') \
     ORDER BY ORDINAL_POSITION";

/// Whether a column of `data_type` can be exported as text.
///
/// The same rule [`LIST_COLUMNS_SQL`] applies on the server, evaluated
/// ASCII case-insensitively as under the default SQL Server collation.
///
/// ```rust
/// use dbexport_core::filter::is_compatible_type;
///
/// assert!(is_compatible_type("nvarchar"));
/// assert!(!is_compatible_type("geography"));
/// assert!(!is_compatible_type("XML"));
/// ```
pub fn is_compatible_type(data_type: &str) -> bool {
    let data_type = data_type.trim();
    !DENIED_TYPES
        .iter()
        .any(|denied| denied.eq_ignore_ascii_case(data_type))
}

/// Returns the exportable columns of `table`, in declaration order.
///
/// An empty set means the table has nothing to export; that is a routing
/// decision for the caller, not an error.
///
/// # Errors
/// Returns `DbExportError::Catalog` if the metadata query cannot execute.
pub async fn compatible_columns<C>(conn: &mut C, table: &TableDescriptor) -> Result<ColumnSet>
where
    C: SqlConnection + ?Sized,
{
    let result = conn
        .query(LIST_COLUMNS_SQL, &[table.schema.as_str(), table.name.as_str()])
        .await
        .map_err(|e| e.into_catalog(&table.schema))?;

    let columns: Vec<String> = result
        .rows
        .into_iter()
        .filter_map(|row| row.into_iter().next().flatten())
        .collect();
    debug!("{}: {} exportable columns", table, columns.len());

    Ok(ColumnSet::new(columns))
}
