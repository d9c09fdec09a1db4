//! Text rendering of SQL Server values for CSV output.

use crate::{Result, adapters::Cell, error::DbExportError};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use tiberius::{ColumnData, FromSql};

/// Renders one column value as text; `NULL` becomes `None`.
///
/// - `bit` renders as `True` / `False`
/// - `uniqueidentifier` renders upper-case, as SQL Server displays it
/// - binary values render as `0x`-prefixed upper-case hex
/// - dates and times render through chrono (`2014-05-30 00:00:00.123`)
///
/// # Errors
/// Returns a query error if a temporal value cannot be decoded.
pub fn render_value(data: ColumnData<'static>) -> Result<Cell> {
    let text = match &data {
        ColumnData::U8(v) => v.map(|v| v.to_string()),
        ColumnData::I16(v) => v.map(|v| v.to_string()),
        ColumnData::I32(v) => v.map(|v| v.to_string()),
        ColumnData::I64(v) => v.map(|v| v.to_string()),
        ColumnData::F32(v) => v.map(|v| v.to_string()),
        ColumnData::F64(v) => v.map(|v| v.to_string()),
        ColumnData::Bit(v) => v.map(|b| (if b { "True" } else { "False" }).to_string()),
        ColumnData::String(v) => v.as_ref().map(ToString::to_string),
        ColumnData::Guid(v) => v.as_ref().map(|g| g.to_string().to_uppercase()),
        ColumnData::Binary(v) => v.as_ref().map(|bytes| binary_literal(bytes)),
        ColumnData::Numeric(v) => v.as_ref().map(ToString::to_string),
        ColumnData::Xml(v) => v.as_ref().map(|xml| xml.clone().into_owned().into_string()),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(&data)
                .map_err(conversion)?
                .map(|dt| dt.to_string())
        }
        ColumnData::Date(_) => NaiveDate::from_sql(&data)
            .map_err(conversion)?
            .map(|d| d.to_string()),
        ColumnData::Time(_) => NaiveTime::from_sql(&data)
            .map_err(conversion)?
            .map(|t| t.to_string()),
        ColumnData::DateTimeOffset(_) => DateTime::<FixedOffset>::from_sql(&data)
            .map_err(conversion)?
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S%.f %:z").to_string()),
    };

    Ok(text)
}

fn conversion(error: tiberius::error::Error) -> DbExportError {
    DbExportError::query_failed_with("value conversion failed", error)
}

fn binary_literal(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode_upper(bytes))
}
