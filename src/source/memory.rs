//! In-memory row source using `DashMap`.
//!
//! Tables live in process memory; useful for tests and for callers that
//! already hold their rows.

use super::{sample_window, RowSource, TableRef};
use crate::row::Row;
use crate::{Error, Result};
use dashmap::DashMap;

/// Row source backed by a concurrent map of table name to rows.
#[derive(Debug, Default)]
pub struct MemoryRowSource {
    tables: DashMap<String, Vec<Row>>,
}

impl MemoryRowSource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a table.
    pub fn insert_table(&self, name: impl Into<String>, rows: Vec<Row>) {
        self.tables.insert(name.into(), rows);
    }

    /// Number of tables.
    #[must_use]
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Row count of a table, if present.
    #[must_use]
    pub fn row_count(&self, name: &str) -> Option<usize> {
        self.tables.get(name).map(|rows| rows.len())
    }

    fn rows(&self, table: &TableRef) -> Result<Vec<Row>> {
        self.tables
            .get(table.name())
            .map(|rows| rows.value().clone())
            .ok_or_else(|| Error::Data(format!("unknown table '{}'", table.name())))
    }
}

impl RowSource for MemoryRowSource {
    async fn fetch_all(&self, table: &TableRef) -> Result<Vec<Row>> {
        let rows = self.rows(table)?;
        table.schema().validate(table.name(), rows)
    }

    async fn fetch_sample(
        &self,
        table: &TableRef,
        count: usize,
        offset_fraction: f64,
    ) -> Result<Vec<Row>> {
        let rows = self.rows(table)?;
        let sample = sample_window(&rows, count, offset_fraction)?;
        table.schema().validate(table.name(), sample)
    }
}
