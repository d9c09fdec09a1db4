//! Command implementations.

use crate::{
    Command, ConnectionArgs, RunArgs, build_export_config, render_summary, resolve_connection,
};
use dbexport_core::{
    DbExportError, Orchestrator, Result,
    adapters::{ConnectionConfig, SqlConnection, mssql::MssqlConnection},
    catalog, filter,
    models::TableDescriptor,
    security::Credentials,
};
use std::fmt::Write as _;
use tracing::{info, warn};

/// Runs a parsed command to completion.
///
/// # Errors
/// Returns the first fatal error; table-level failures are not errors.
pub async fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Export(args) => export(&args).await,
        Command::Test(args) => test_connection(&args).await,
        Command::ListTables(args) => list_tables(&args).await,
    }
}

fn prompt_password() -> Result<String> {
    rpassword::prompt_password("SQL Server password: ")
        .map_err(|e| DbExportError::configuration(format!("Failed to read password: {}", e)))
}

async fn connect(config: &ConnectionConfig, credentials: &Credentials) -> Result<MssqlConnection> {
    info!("Target: {}", config);
    MssqlConnection::connect(config, credentials).await
}

/// Exports every configured schema and prints a summary.
async fn export(args: &RunArgs) -> Result<()> {
    let (connection, credentials) = resolve_connection(&args.connection, prompt_password)?;
    let config = build_export_config(&args.export, connection)?;

    info!("Starting export");
    info!("Output: {}", config.output_root.display());
    let conn = connect(&config.connection, &credentials).await?;
    drop(credentials);

    let report = Orchestrator::new(config).run_scoped(conn).await?;

    if let Some(path) = &args.export.report {
        report.save(path).await?;
        info!("Run report saved to {}", path.display());
    }

    print!("{}", render_summary(&report));
    Ok(())
}

/// Connects, runs `SELECT 1` and disconnects.
async fn test_connection(args: &ConnectionArgs) -> Result<()> {
    let (config, credentials) = resolve_connection(args, prompt_password)?;
    info!("Testing connection");

    let mut conn = connect(&config, &credentials).await?;
    let answer = conn.query("SELECT 1 AS ok", &[]).await;
    let description = conn.safe_description();
    if let Err(e) = conn.close().await {
        warn!("Failed to close {}: {}", description, e);
    }

    let result = answer?;
    if result.rows.first().and_then(|row| row.first()).cloned().flatten().as_deref() != Some("1") {
        return Err(DbExportError::query_failed("unexpected answer to SELECT 1"));
    }

    info!("Connection test successful");
    println!("Connection to {} successful", description);
    Ok(())
}

/// One line of `list-tables` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableListing {
    /// Base table
    pub table: TableDescriptor,
    /// Columns that survive the type filter
    pub exportable_columns: usize,
}

/// Collects base tables and exportable column counts for `schemas`.
///
/// # Errors
/// Returns a catalog error if a schema is missing or a lookup fails.
pub async fn collect_listing<C>(conn: &mut C, schemas: &[String]) -> Result<Vec<TableListing>>
where
    C: SqlConnection + ?Sized,
{
    let mut listing = Vec::new();
    for schema in schemas {
        catalog::ensure_schema_exists(conn, schema).await?;
        for name in catalog::list_tables(conn, schema).await? {
            let table = TableDescriptor::new(schema.as_str(), name);
            let columns = filter::compatible_columns(conn, &table).await?;
            listing.push(TableListing {
                table,
                exportable_columns: columns.len(),
            });
        }
    }
    Ok(listing)
}

/// Formats a listing, marking tables that would be skipped.
pub fn render_listing(listing: &[TableListing]) -> String {
    let width = listing
        .iter()
        .map(|l| l.table.to_string().len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for entry in listing {
        let note = if entry.exportable_columns == 0 {
            " (skipped: no exportable columns)"
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "{:<width$}  {} columns{}",
            entry.table.to_string(),
            entry.exportable_columns,
            note,
            width = width
        );
    }
    out
}

async fn list_tables(args: &RunArgs) -> Result<()> {
    let (connection, credentials) = resolve_connection(&args.connection, prompt_password)?;
    let config = build_export_config(&args.export, connection)?;

    let mut conn = connect(&config.connection, &credentials).await?;
    let listing = collect_listing(&mut conn, &config.schemas).await;
    let description = conn.safe_description();
    if let Err(e) = conn.close().await {
        warn!("Failed to close {}: {}", description, e);
    }

    print!("{}", render_listing(&listing?));
    Ok(())
}
