//! CSV output. The header is the `Into` type's property declaration order,
//! taken from serializing its `Default` value.

use crate::error::{DataError, Result};
use futures::stream::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::io::Write;

/// Column names of `T` in declaration order
pub fn csv_header<T: Serialize + Default>() -> Result<Vec<String>> {
    match serde_json::to_value(T::default())? {
        Value::Object(map) => Ok(map.keys().cloned().collect()),
        other => Err(DataError::SerializationError(format!(
            "CSV rows must serialize to objects, got {}",
            other
        ))),
    }
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn record<T: Serialize>(row: &T, header: &[String]) -> Result<Vec<String>> {
    let value = serde_json::to_value(row)?;
    Ok(header.iter().map(|column| cell(value.get(column))).collect())
}

fn csv_error(e: csv::Error) -> DataError {
    DataError::SerializationError(format!("CSV write failed: {}", e))
}

/// Write rows as CSV, header first
pub fn write_csv<T, W>(rows: &[T], writer: W) -> Result<W>
where
    T: Serialize + Default,
    W: Write,
{
    let header = csv_header::<T>()?;
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(&header).map_err(csv_error)?;
    for row in rows {
        csv.write_record(record(row, &header)?).map_err(csv_error)?;
    }
    csv.into_inner()
        .map_err(|e| DataError::SerializationError(format!("CSV flush failed: {}", e)))
}

/// Drain a row stream into CSV without materializing it. An error from the
/// stream stops the export and is returned.
pub async fn write_csv_stream<T, S, W>(mut rows: S, writer: W) -> Result<W>
where
    T: Serialize + Default,
    S: Stream<Item = Result<T>> + Unpin,
    W: Write,
{
    let header = csv_header::<T>()?;
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(&header).map_err(csv_error)?;
    while let Some(row) = rows.next().await {
        csv.write_record(record(&row?, &header)?).map_err(csv_error)?;
    }
    csv.into_inner()
        .map_err(|e| DataError::SerializationError(format!("CSV flush failed: {}", e)))
}

pub fn to_csv_string<T: Serialize + Default>(rows: &[T]) -> Result<String> {
    let bytes = write_csv(rows, Vec::new())?;
    String::from_utf8(bytes).map_err(|e| DataError::SerializationError(e.to_string()))
}
