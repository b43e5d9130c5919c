//! Parquet-backed row source (Arrow record batches)
//!
//! Each registered table maps to one Parquet file. Files are read in full on
//! every fetch on the blocking thread pool and converted row by row into
//! [`Row`] values, so the rest of the engine never sees Arrow types.

use super::{sample_window, RowSource, TableRef};
use crate::row::Row;
use crate::{Error, Result};
use arrow::array::{
    Array, ArrayRef, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    LargeStringArray, StringArray,
};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use rustc_hash::FxHashMap;
use serde_json::{Map, Number, Value};
use std::path::{Path, PathBuf};

/// Row source reading tables from Parquet files.
#[derive(Debug, Default)]
pub struct ParquetRowSource {
    tables: FxHashMap<String, PathBuf>,
}

impl ParquetRowSource {
    /// Create a source with no registered tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table backed by a Parquet file.
    #[must_use]
    pub fn with_table(mut self, name: impl Into<String>, path: impl AsRef<Path>) -> Self {
        self.tables.insert(name.into(), path.as_ref().to_path_buf());
        self
    }

    fn path_for(&self, table: &TableRef) -> Result<PathBuf> {
        self.tables
            .get(table.name())
            .cloned()
            .ok_or_else(|| Error::Data(format!("unknown table '{}'", table.name())))
    }

    async fn load(&self, table: &TableRef) -> Result<Vec<Row>> {
        let path = self.path_for(table)?;
        tokio::task::spawn_blocking(move || load_parquet_rows(&path))
            .await
            .map_err(|e| Error::StorageError(format!("Parquet loader task failed: {e}")))?
    }
}

impl RowSource for ParquetRowSource {
    async fn fetch_all(&self, table: &TableRef) -> Result<Vec<Row>> {
        let rows = self.load(table).await?;
        tracing::debug!(table = table.name(), rows = rows.len(), "loaded parquet table");
        table.schema().validate(table.name(), rows)
    }

    async fn fetch_sample(
        &self,
        table: &TableRef,
        count: usize,
        offset_fraction: f64,
    ) -> Result<Vec<Row>> {
        let rows = self.load(table).await?;
        let sample = sample_window(&rows, count, offset_fraction)?;
        table.schema().validate(table.name(), sample)
    }
}

/// Read every record batch of a Parquet file into rows.
fn load_parquet_rows(path: &Path) -> Result<Vec<Row>> {
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::fs::File;

    let file = File::open(path).map_err(|e| {
        Error::StorageError(format!("Failed to open Parquet file {}: {e}", path.display()))
    })?;

    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| Error::StorageError(format!("Failed to parse Parquet file: {e}")))?;

    let reader = builder
        .build()
        .map_err(|e| Error::StorageError(format!("Failed to create Parquet reader: {e}")))?;

    let mut rows = Vec::new();
    for batch in reader {
        rows.extend(record_batch_to_rows(&batch?)?);
    }
    Ok(rows)
}

/// Convert an Arrow record batch into rows keyed by column name.
///
/// Strings, booleans, 32/64-bit integers and floats map to the matching JSON
/// scalar; nulls and NaN map to `null`; any other type falls back to Arrow's
/// display formatting.
///
/// # Errors
///
/// Returns an Arrow error if a value cannot be formatted.
pub fn record_batch_to_rows(batch: &RecordBatch) -> Result<Vec<Row>> {
    let schema = batch.schema();
    let mut rows: Vec<Map<String, Value>> = vec![Map::new(); batch.num_rows()];

    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        for (index, row) in rows.iter_mut().enumerate() {
            row.insert(field.name().clone(), cell_value(column, index)?);
        }
    }

    Ok(rows.into_iter().map(Row::from_map).collect())
}

fn cell_value(column: &ArrayRef, index: usize) -> Result<Value> {
    if column.is_null(index) {
        return Ok(Value::Null);
    }

    let any = column.as_any();
    let value = match column.data_type() {
        DataType::Utf8 => any
            .downcast_ref::<StringArray>()
            .map(|a| Value::String(a.value(index).to_string())),
        DataType::LargeUtf8 => any
            .downcast_ref::<LargeStringArray>()
            .map(|a| Value::String(a.value(index).to_string())),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map(|a| Value::Bool(a.value(index))),
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map(|a| Value::from(a.value(index))),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map(|a| Value::from(a.value(index))),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map(|a| float_value(f64::from(a.value(index)))),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map(|a| float_value(a.value(index))),
        _ => None,
    };

    match value {
        Some(value) => Ok(value),
        None => {
            let text = arrow::util::display::array_value_to_string(column, index)?;
            Ok(Value::String(text))
        }
    }
}

fn float_value(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    #[test]
    fn test_record_batch_to_rows() {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int32, false),
            Field::new("title", DataType::Utf8, true),
            Field::new("score", DataType::Float64, false),
        ]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(Int32Array::from(vec![1, 2])),
                Arc::new(StringArray::from(vec![Some("alpha"), None])),
                Arc::new(Float64Array::from(vec![0.5, f64::NAN])),
            ],
        )
        .unwrap();

        let rows = record_batch_to_rows(&batch).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text("id").as_deref(), Some("1"));
        assert_eq!(rows[0].text("title").as_deref(), Some("alpha"));
        assert_eq!(rows[0].text("score").as_deref(), Some("0.5"));
        assert_eq!(rows[1].text("title"), None);
        assert_eq!(rows[1].get("score"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_unknown_table() {
        let source = ParquetRowSource::new();
        let err = source.fetch_all(&TableRef::new("nope")).await.unwrap_err();
        assert!(matches!(err, Error::Data(_)));
    }

    #[tokio::test]
    async fn test_missing_file_is_storage_error() {
        let source = ParquetRowSource::new().with_table("t", "/nonexistent/combo_eval.parquet");
        let err = source.fetch_all(&TableRef::new("t")).await.unwrap_err();
        assert!(matches!(err, Error::StorageError(_)));
    }
}
