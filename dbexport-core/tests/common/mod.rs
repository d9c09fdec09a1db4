//! In-memory SQL Server stand-in for pipeline tests.
//!
//! Answers the catalog queries issued by the pipeline and the bracketed
//! projection queries built by the exporter. Failures and hangs can be
//! injected per schema or per table.

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::arithmetic_side_effects
)]

use async_trait::async_trait;
use dbexport_core::{
    DbExportError, Result,
    adapters::{Cell, ResultSet, SqlConnection},
    catalog::LIST_TABLES_SQL,
    filter::{DENIED_TYPES, LIST_COLUMNS_SQL, is_compatible_type},
};
use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::Duration,
};

/// A table: typed columns plus full-width rows.
#[derive(Debug, Clone)]
pub struct FakeTable {
    pub name: String,
    pub columns: Vec<(String, String)>,
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Default)]
struct State {
    schemas: Vec<(String, Vec<FakeTable>)>,
    failing_catalogs: HashSet<String>,
    failing_column_lookups: HashSet<(String, String)>,
    failing_queries: HashSet<(String, String)>,
    hang: Option<Duration>,
    fail_close: bool,
    case_sensitive_collation: bool,
    queries: Vec<String>,
    close_calls: usize,
}

/// Cloneable handle; clones share the same store and query log.
#[derive(Debug, Clone, Default)]
pub struct FakeConnection {
    state: Arc<Mutex<State>>,
}

/// Builds a row from optional values; `None` is SQL `NULL`.
pub fn row(values: &[Option<&str>]) -> Vec<Cell> {
    values.iter().map(|v| v.map(ToString::to_string)).collect()
}

impl FakeConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table; schemas and tables keep insertion order.
    pub fn with_table(
        self,
        schema: &str,
        table: &str,
        columns: &[(&str, &str)],
        rows: Vec<Vec<Cell>>,
    ) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let entry = FakeTable {
                name: table.to_string(),
                columns: columns
                    .iter()
                    .map(|(n, t)| ((*n).to_string(), (*t).to_string()))
                    .collect(),
                rows,
            };
            match state.schemas.iter().position(|(s, _)| s == schema) {
                Some(index) => state.schemas[index].1.push(entry),
                None => state.schemas.push((schema.to_string(), vec![entry])),
            }
        }
        self
    }

    /// Declares a schema with no tables.
    pub fn with_schema(self, schema: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            if !state.schemas.iter().any(|(s, _)| s == schema) {
                state.schemas.push((schema.to_string(), Vec::new()));
            }
        }
        self
    }

    pub fn failing_catalog(self, schema: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_catalogs
            .insert(schema.to_string());
        self
    }

    pub fn failing_column_lookup(self, schema: &str, table: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_column_lookups
            .insert((schema.to_string(), table.to_string()));
        self
    }

    pub fn failing_query(self, schema: &str, table: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_queries
            .insert((schema.to_string(), table.to_string()));
        self
    }

    /// Every data query sleeps this long before answering.
    pub fn hanging(self, delay: Duration) -> Self {
        self.state.lock().unwrap().hang = Some(delay);
        self
    }

    /// Compares type names byte for byte, as a `_CS_` collation would.
    pub fn with_case_sensitive_collation(self) -> Self {
        self.state.lock().unwrap().case_sensitive_collation = true;
        self
    }

    pub fn failing_close(self) -> Self {
        self.state.lock().unwrap().fail_close = true;
        self
    }

    /// Every statement received so far, in order.
    pub fn queries(&self) -> Vec<String> {
        self.state.lock().unwrap().queries.clone()
    }

    /// Data queries (projections) received so far.
    pub fn data_queries(&self) -> Vec<String> {
        self.queries()
            .into_iter()
            .filter(|q| q.starts_with("SELECT ["))
            .collect()
    }

    pub fn close_calls(&self) -> usize {
        self.state.lock().unwrap().close_calls
    }

    fn answer(&self, sql: &str, params: &[&str]) -> Result<ResultSet> {
        let state = self.state.lock().unwrap();

        if sql == LIST_TABLES_SQL {
            let schema = params[0];
            if state.failing_catalogs.contains(schema) {
                return Err(DbExportError::query_failed(
                    "The SELECT permission was denied on the object 'TABLES'",
                ));
            }
            let rows: Vec<Vec<Cell>> = state
                .schemas
                .iter()
                .find(|(s, _)| s == schema)
                .map(|(_, tables)| tables.iter().map(|t| vec![Some(t.name.clone())]).collect())
                .unwrap_or_default();
            return Ok(ResultSet::new(vec!["TABLE_NAME".to_string()], rows));
        }

        if sql == LIST_COLUMNS_SQL {
            let key = (params[0].to_string(), params[1].to_string());
            if state.failing_column_lookups.contains(&key) {
                return Err(DbExportError::query_failed("connection reset by peer"));
            }
            // DATA_TYPE NOT IN (...) under the configured collation
            let allowed = |ty: &str| {
                if state.case_sensitive_collation {
                    !DENIED_TYPES.contains(&ty)
                } else {
                    is_compatible_type(ty)
                }
            };
            let rows: Vec<Vec<Cell>> = state
                .find(&key.0, &key.1)
                .map(|t| {
                    t.columns
                        .iter()
                        .filter(|(_, ty)| allowed(ty))
                        .map(|(n, _)| vec![Some(n.clone())])
                        .collect()
                })
                .unwrap_or_default();
            return Ok(ResultSet::new(vec!["COLUMN_NAME".to_string()], rows));
        }

        if sql.starts_with("SELECT SCHEMA_NAME") {
            let rows: Vec<Vec<Cell>> = state
                .schemas
                .iter()
                .filter(|(s, _)| s == params[0])
                .map(|(s, _)| vec![Some(s.clone())])
                .collect();
            return Ok(ResultSet::new(vec!["SCHEMA_NAME".to_string()], rows));
        }

        let (select_list, from) = sql
            .strip_prefix("SELECT ")
            .and_then(|rest| rest.split_once(" FROM "))
            .ok_or_else(|| DbExportError::query_failed(format!("unsupported statement: {sql}")))?;
        let requested = parse_bracketed(select_list);
        let target = parse_bracketed(from);
        let [schema, table] = target.as_slice() else {
            return Err(DbExportError::query_failed(format!("bad table reference: {from}")));
        };

        if state.failing_queries.contains(&(schema.clone(), table.clone())) {
            return Err(DbExportError::query_failed(format!(
                "Invalid object name '{schema}.{table}'"
            )));
        }

        let fake = state
            .find(schema, table)
            .ok_or_else(|| DbExportError::query_failed(format!("Invalid object name '{table}'")))?;

        let mut indexes = Vec::with_capacity(requested.len());
        for column in &requested {
            let index = fake
                .columns
                .iter()
                .position(|(n, _)| n == column)
                .ok_or_else(|| DbExportError::query_failed(format!("Invalid column name '{column}'")))?;
            indexes.push(index);
        }

        let rows: Vec<Vec<Cell>> = fake
            .rows
            .iter()
            .map(|r| indexes.iter().map(|&i| r[i].clone()).collect())
            .collect();
        Ok(ResultSet::new(requested, rows))
    }
}

impl State {
    fn find(&self, schema: &str, table: &str) -> Option<&FakeTable> {
        self.schemas
            .iter()
            .find(|(s, _)| s == schema)
            .and_then(|(_, tables)| tables.iter().find(|t| t.name == table))
    }
}

/// Extracts `[...]`-delimited identifiers, undoubling `]]`.
fn parse_bracketed(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '[' {
            continue;
        }
        let mut ident = String::new();
        while let Some(c) = chars.next() {
            if c == ']' {
                if chars.peek() == Some(&']') {
                    chars.next();
                    ident.push(']');
                } else {
                    break;
                }
            } else {
                ident.push(c);
            }
        }
        out.push(ident);
    }
    out
}

#[async_trait]
impl SqlConnection for FakeConnection {
    async fn query(&mut self, sql: &str, params: &[&str]) -> Result<ResultSet> {
        let hang = {
            let mut state = self.state.lock().unwrap();
            state.queries.push(sql.to_string());
            state.hang.filter(|_| sql.starts_with("SELECT ["))
        };
        if let Some(delay) = hang {
            tokio::time::sleep(delay).await;
        }
        self.answer(sql, params)
    }

    async fn close(self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.close_calls += 1;
        if state.fail_close {
            return Err(DbExportError::connection_failed(
                "close failed",
                std::io::Error::from(std::io::ErrorKind::BrokenPipe),
            ));
        }
        Ok(())
    }

    fn safe_description(&self) -> String {
        "in-memory SQL Server".to_string()
    }
}

/// The AdventureWorks-shaped fixture most tests start from.
pub fn adventure_works() -> FakeConnection {
    FakeConnection::new()
        .with_table(
            "Production",
            "SpatialLocations",
            &[("LocationGeo", "geography"), ("Shape", "geometry")],
            vec![row(&[Some("POINT(1 2)"), Some("POLYGON")])],
        )
        .with_table(
            "Production",
            "Product",
            &[
                ("ProductID", "int"),
                ("Name", "nvarchar"),
                ("CatalogDescription", "xml"),
                ("ListPrice", "money"),
            ],
            vec![
                row(&[Some("1"), Some("Adjustable Race"), Some("<x/>"), Some("0.00")]),
                row(&[Some("2"), Some("Bearing Ball"), None, Some("0.00")]),
            ],
        )
        .with_table("Sales", "EmptyLog", &[("LogID", "int"), ("Message", "nvarchar")], vec![])
        .with_table(
            "Sales",
            "Store",
            &[("BusinessEntityID", "int"), ("Name", "nvarchar")],
            vec![row(&[Some("292"), Some("Next-Door Bike Store")])],
        )
        .with_table(
            "Person",
            "Address",
            &[
                ("AddressID", "int"),
                ("AddressLine1", "nvarchar"),
                ("City", "nvarchar"),
                ("SpatialLocation", "geography"),
            ],
            vec![
                row(&[Some("1"), Some("1970 Napa Ct."), Some("Bothell"), Some("0xE6100000")]),
                row(&[Some("2"), Some("9833 Mt. Dias Blv."), Some("Bothell"), None]),
            ],
        )
}
