//! Base table enumeration for a schema.

use crate::{Result, adapters::SqlConnection, error::DbExportError};
use tracing::{debug, warn};

/// Lists base tables (not views or synonyms) of the schema bound to `@P1`.
///
/// No ordering clause: names come back in whatever order the store yields.
pub const LIST_TABLES_SQL: &str = "SELECT TABLE_NAME \
     FROM INFORMATION_SCHEMA.TABLES \
     WHERE TABLE_SCHEMA = @P1 AND TABLE_TYPE = 'BASE TABLE'";

/// Returns the base table names of `schema` in store order.
///
/// A schema without base tables (or one that does not exist) yields an
/// empty list, not an error.
///
/// # Errors
/// Returns `DbExportError::Catalog` if the metadata query cannot execute,
/// for example after the connection dropped or when the login lacks
/// `VIEW DEFINITION` on the schema.
pub async fn list_tables<C>(conn: &mut C, schema: &str) -> Result<Vec<String>>
where
    C: SqlConnection + ?Sized,
{
    let result = conn
        .query(LIST_TABLES_SQL, &[schema])
        .await
        .map_err(|e| e.into_catalog(schema))?;

    let mut tables = Vec::with_capacity(result.rows.len());
    for row in result.rows {
        match row.into_iter().next().flatten() {
            Some(name) => tables.push(name),
            None => warn!("Ignoring catalog row without a table name in schema {}", schema),
        }
    }

    debug!("Schema {} has {} base tables", schema, tables.len());
    Ok(tables)
}

/// Fails with a catalog error unless `schema` exists on the server.
///
/// Used by the `test` and `list-tables` commands to tell a missing schema
/// apart from an empty one.
///
/// # Errors
/// Returns `DbExportError::Catalog` when the schema is missing or the
/// lookup fails.
pub async fn ensure_schema_exists<C>(conn: &mut C, schema: &str) -> Result<()>
where
    C: SqlConnection + ?Sized,
{
    let result = conn
        .query(
            "SELECT SCHEMA_NAME FROM INFORMATION_SCHEMA.SCHEMATA WHERE SCHEMA_NAME = @P1",
            &[schema],
        )
        .await
        .map_err(|e| e.into_catalog(schema))?;

    if result.is_empty() {
        return Err(DbExportError::catalog(schema, "schema does not exist"));
    }
    Ok(())
}
