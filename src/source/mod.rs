//! Row sources
//!
//! The engine reads rows only through [`RowSource`]. A source resolves a
//! [`TableRef`], validates its rows against the table's [`RowSchema`] once,
//! and hands back typed [`Row`]s.
//!
//! # Example
//!
//! ```rust
//! use combo_eval::row::Row;
//! use combo_eval::source::{MemoryRowSource, RowSource, TableRef};
//!
//! # async fn example() -> combo_eval::Result<()> {
//! let source = MemoryRowSource::new();
//! source.insert_table("docs", vec![Row::new().with("title", "Intro")]);
//!
//! let rows = source.fetch_all(&TableRef::new("docs")).await?;
//! assert_eq!(rows.len(), 1);
//! # Ok(())
//! # }
//! ```

mod memory;
mod parquet_file;

pub use self::memory::MemoryRowSource;
pub use self::parquet_file::{record_batch_to_rows, ParquetRowSource};

use crate::row::{Row, RowSchema};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Reference to a table plus its declared schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    name: String,
    #[serde(default)]
    schema: RowSchema,
}

impl TableRef {
    /// Reference a table with an empty (accept-all) schema.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: RowSchema::default(),
        }
    }

    /// Attach a schema.
    #[must_use]
    pub fn with_schema(mut self, schema: RowSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared schema.
    #[must_use]
    pub const fn schema(&self) -> &RowSchema {
        &self.schema
    }
}

/// Source of rows for an experiment.
pub trait RowSource: Send + Sync {
    /// Fetch every row of the table.
    fn fetch_all(&self, table: &TableRef) -> impl Future<Output = Result<Vec<Row>>> + Send;

    /// Fetch up to `count` rows starting at `offset_fraction` (0..1) of the
    /// table, wrapping around to the start if needed.
    fn fetch_sample(
        &self,
        table: &TableRef,
        count: usize,
        offset_fraction: f64,
    ) -> impl Future<Output = Result<Vec<Row>>> + Send;
}

/// Slice a sample window out of a full row set.
///
/// Starts at `floor(len · offset_fraction)` and wraps around, so up to
/// `min(count, len)` distinct rows are returned.
///
/// # Errors
///
/// Returns `Error::InvalidInput` if `offset_fraction` is outside `[0, 1)`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn sample_window(rows: &[Row], count: usize, offset_fraction: f64) -> Result<Vec<Row>> {
    if !(0.0..1.0).contains(&offset_fraction) {
        return Err(Error::InvalidInput(format!(
            "offset fraction must be in [0, 1), got {offset_fraction}"
        )));
    }
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let start = ((rows.len() as f64) * offset_fraction).floor() as usize;
    Ok(rows
        .iter()
        .cycle()
        .skip(start)
        .take(count.min(rows.len()))
        .cloned()
        .collect())
}
