//! Run orchestration across schemas and tables.
//!
//! One connection, strictly sequential: schemas in configured order,
//! tables in catalog order, one table fully finished before the next
//! begins. A failing table is recorded and skipped; a failing catalog
//! query ends the run unless [`CatalogFailurePolicy::SkipSchema`] is set.

use crate::{
    Result,
    adapters::{CatalogFailurePolicy, ExportConfig, SqlConnection},
    catalog,
    error::DbExportError,
    export::TableExporter,
    models::{ExportOutcome, TableDescriptor},
    report::RunReport,
};
use tracing::{debug, error, info, warn};

/// Progress callbacks fired while a run is in flight.
///
/// All methods default to doing nothing.
pub trait ExportObserver: Send {
    /// A schema is about to be enumerated.
    fn schema_started(&mut self, _schema: &str) {}

    /// Enumeration of a schema returned `count` base tables.
    fn tables_discovered(&mut self, _schema: &str, _count: usize) {}

    /// A table reached its final outcome.
    fn table_finished(&mut self, _table: &TableDescriptor, _outcome: &ExportOutcome) {}

    /// Enumeration of a schema failed.
    fn schema_failed(&mut self, _schema: &str, _error: &DbExportError) {}
}

/// Observer that reports progress through `tracing`.
///
/// Every event carries the schema, and where applicable the table, so
/// the log alone is enough to reconstruct what happened.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ExportObserver for TracingObserver {
    fn schema_started(&mut self, schema: &str) {
        info!("Processing schema {}", schema);
    }

    fn tables_discovered(&mut self, schema: &str, count: usize) {
        info!("Found {} tables in schema {}", count, schema);
    }

    fn table_finished(&mut self, table: &TableDescriptor, outcome: &ExportOutcome) {
        let label = outcome.label();
        match outcome {
            ExportOutcome::Written { path, row_count } => info!(
                outcome = label,
                "Exported {}.{} ({} rows) to {}",
                table.schema,
                table.name,
                row_count,
                path.display()
            ),
            ExportOutcome::SkippedEmpty => info!(
                outcome = label,
                "Table {}.{} is empty, no file written",
                table.schema,
                table.name
            ),
            ExportOutcome::SkippedNoCompatibleColumns => warn!(
                outcome = label,
                "Table {}.{} has no exportable columns, skipped",
                table.schema,
                table.name
            ),
            ExportOutcome::Failed(failure) => error!(
                outcome = label,
                "Failed to export {}.{}: {}",
                table.schema,
                table.name,
                failure
            ),
        }
    }

    fn schema_failed(&mut self, schema: &str, error: &DbExportError) {
        error!("Failed to list tables in schema {}: {}", schema, error);
    }
}

/// Drives a full export run over one connection.
pub struct Orchestrator<O = TracingObserver> {
    config: ExportConfig,
    exporter: TableExporter,
    observer: O,
}

impl Orchestrator<TracingObserver> {
    /// Creates an orchestrator that logs progress through `tracing`.
    pub fn new(config: ExportConfig) -> Self {
        Self::with_observer(config, TracingObserver)
    }
}

impl<O: ExportObserver> Orchestrator<O> {
    /// Creates an orchestrator with a custom progress observer.
    pub fn with_observer(config: ExportConfig, observer: O) -> Self {
        let exporter = TableExporter::new(config.output_root.clone());
        Self {
            config,
            exporter,
            observer,
        }
    }

    /// Run configuration.
    pub const fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// The progress observer.
    pub const fn observer(&self) -> &O {
        &self.observer
    }

    /// Consumes the orchestrator, returning its observer.
    pub fn into_observer(self) -> O {
        self.observer
    }

    /// Exports every base table of every configured schema.
    ///
    /// Table-level failures never end the run; they are recorded in the
    /// returned report. The connection is left open.
    ///
    /// # Errors
    /// Returns `DbExportError::Configuration` for an invalid configuration
    /// and `DbExportError::Catalog` when table enumeration fails under
    /// [`CatalogFailurePolicy::AbortRun`].
    pub async fn run<C>(&mut self, conn: &mut C) -> Result<RunReport>
    where
        C: SqlConnection + ?Sized,
    {
        self.config.validate()?;

        let schemas = self.config.schemas.clone();
        let mut report = RunReport::new(schemas.clone());
        info!(
            "Exporting schemas [{}] from {} into {}",
            schemas.join(", "),
            conn.safe_description(),
            self.config.output_root.display()
        );

        for schema in &schemas {
            self.observer.schema_started(schema);

            let tables = match catalog::list_tables(conn, schema).await {
                Ok(tables) => tables,
                Err(e) => {
                    self.observer.schema_failed(schema, &e);
                    match self.config.catalog_failure_policy {
                        CatalogFailurePolicy::AbortRun => return Err(e),
                        CatalogFailurePolicy::SkipSchema => {
                            report.record_schema_failure(schema, &e);
                            continue;
                        }
                    }
                }
            };
            self.observer.tables_discovered(schema, tables.len());

            for name in tables {
                let table = TableDescriptor::new(schema.as_str(), name);
                debug!("Exporting {}", table);

                let outcome = self.exporter.export_table(conn, &table).await;
                self.observer.table_finished(&table, &outcome);
                report.record(&table, outcome);
            }
        }

        report.finish();
        let summary = &report.summary;
        info!(
            "Export finished: {} written ({} rows), {} empty, {} without exportable columns, {} failed",
            summary.written,
            summary.rows_written,
            summary.skipped_empty,
            summary.skipped_no_compatible_columns,
            summary.failed
        );
        Ok(report)
    }

    /// Like [`run`](Self::run), but owns the connection and always closes it.
    ///
    /// A failure to close is logged and does not change the result: every
    /// file the run reported has already been renamed into place.
    ///
    /// # Errors
    /// Same as [`run`](Self::run).
    pub async fn run_scoped<C>(&mut self, mut conn: C) -> Result<RunReport>
    where
        C: SqlConnection,
    {
        let result = self.run(&mut conn).await;
        let description = conn.safe_description();

        match conn.close().await {
            Ok(()) => debug!("Closed {}", description),
            Err(e) => warn!("Failed to close {}: {}", description, e),
        }
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn log_of(outcome: &ExportOutcome) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            TracingObserver.table_finished(&TableDescriptor::new("Sales", "EmptyLog"), outcome);
        });
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_tracing_observer_logs_outcome_label() {
        let line = log_of(&ExportOutcome::SkippedEmpty);
        assert!(line.contains("SkippedEmpty"), "{}", line);
        assert!(line.contains("Sales.EmptyLog"));

        let line = log_of(&ExportOutcome::SkippedNoCompatibleColumns);
        assert!(line.contains("SkippedNoCompatibleColumns"), "{}", line);
        assert!(line.contains("WARN"));
    }

    #[test]
    fn test_tracing_observer_is_default() {
        let orchestrator = Orchestrator::new(ExportConfig::default());
        assert_eq!(orchestrator.config().schemas.len(), 3);
    }
}
