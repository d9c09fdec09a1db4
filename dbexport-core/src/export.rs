//! Table export: projection query, CSV serialization and file placement.

use crate::{
    Result,
    adapters::{Cell, SqlConnection, config::is_safe_path_component},
    error::DbExportError,
    filter,
    models::{ColumnSet, ExportOutcome, TableDescriptor},
};
use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Delimits an identifier for T-SQL, doubling any closing bracket.
///
/// ```rust
/// use dbexport_core::export::quote_identifier;
///
/// assert_eq!(quote_identifier("Order Details"), "[Order Details]");
/// assert_eq!(quote_identifier("odd]name"), "[odd]]name]");
/// ```
pub fn quote_identifier(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Builds the full-scan projection over exactly `columns`.
///
/// No `WHERE` and no `ORDER BY`: every row, in store order.
pub fn projection_query(table: &TableDescriptor, columns: &ColumnSet) -> String {
    let select_list = columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "SELECT {} FROM {}.{}",
        select_list,
        quote_identifier(&table.schema),
        quote_identifier(&table.name)
    )
}

/// Serializes rows as RFC 4180 CSV with a header row.
///
/// `NULL` cells become empty fields. Every row must have exactly one cell
/// per column.
///
/// # Errors
/// Returns a serialization error if a row's width differs from the header.
pub fn render_csv(columns: &ColumnSet, rows: &[Vec<Cell>]) -> Result<Vec<u8>> {
    write_csv(Vec::new(), columns, rows)
}

/// Streams the CSV form of `rows` into `sink`, returning it flushed.
///
/// # Errors
/// Returns a serialization error if a row's width differs from the header
/// or the sink fails.
pub fn write_csv<W: Write>(sink: W, columns: &ColumnSet, rows: &[Vec<Cell>]) -> Result<W> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(sink);

    writer
        .write_record(columns.as_slice())
        .map_err(|e| DbExportError::serialization("CSV header", e))?;

    for row in rows {
        writer
            .write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))
            .map_err(|e| DbExportError::serialization("CSV row", e))?;
    }

    writer
        .into_inner()
        .map_err(|e| DbExportError::serialization("CSV flush", e.into_error()))
}

/// Exports single tables into `{output_root}/{schema}/{table}.csv`.
#[derive(Debug, Clone)]
pub struct TableExporter {
    output_root: PathBuf,
}

impl TableExporter {
    /// Creates an exporter writing below `output_root`.
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }

    /// Root directory of the export.
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Exports one table and reports what happened.
    ///
    /// Never returns an error: failures are folded into
    /// [`ExportOutcome::Failed`] so the caller can move on to the next table.
    pub async fn export_table<C>(&self, conn: &mut C, table: &TableDescriptor) -> ExportOutcome
    where
        C: SqlConnection + ?Sized,
    {
        match self.try_export(conn, table).await {
            Ok(outcome) => outcome,
            Err(error) => ExportOutcome::failed(&error),
        }
    }

    async fn try_export<C>(&self, conn: &mut C, table: &TableDescriptor) -> Result<ExportOutcome>
    where
        C: SqlConnection + ?Sized,
    {
        let columns = filter::compatible_columns(conn, table).await?;
        if columns.is_empty() {
            return Ok(ExportOutcome::SkippedNoCompatibleColumns);
        }

        if !is_safe_path_component(&table.name) {
            return Err(DbExportError::configuration(format!(
                "table name '{}' cannot be used as a file name",
                table.name
            )));
        }

        let sql = projection_query(table, &columns);
        debug!("Querying {}: {}", table, sql);
        let result = conn.query(&sql, &[]).await.map_err(|e| match e {
            DbExportError::Query { context, source } => DbExportError::Query {
                context: format!("{} ({})", context, table),
                source,
            },
            other => other,
        })?;

        if result.is_empty() {
            return Ok(ExportOutcome::SkippedEmpty);
        }

        let row_count = result.row_count();
        let rows = result.rows;
        let path = table.output_path(&self.output_root);
        write_replacing(&path, move |file| {
            write_csv(file, &columns, &rows)?
                .sync_all()
                .map_err(|e| DbExportError::io("sync CSV file", e))
        })
        .await?;

        Ok(ExportOutcome::Written { path, row_count })
    }
}

/// Writes a temp file next to `path` through `write`, then renames it
/// into place.
///
/// Readers see either the previous file or the complete new one. The
/// parent directory is created if missing, and the temp file is removed
/// when writing fails.
async fn write_replacing<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(File) -> Result<()> + Send + 'static,
{
    let parent = path
        .parent()
        .ok_or_else(|| DbExportError::configuration("output path has no parent directory"))?;

    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| DbExportError::io(format!("create {}", parent.display()), e))?;

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    let target = temp_path.clone();
    let written = tokio::task::spawn_blocking(move || {
        let file = File::create(&target)
            .map_err(|e| DbExportError::io(format!("write {}", target.display()), e))?;
        write(file)
    })
    .await
    .map_err(|e| DbExportError::io("CSV writer task", std::io::Error::other(e)))
    .and_then(|result| result);

    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e);
    }

    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(DbExportError::io(format!("rename to {}", path.display()), e));
    }

    Ok(())
}
