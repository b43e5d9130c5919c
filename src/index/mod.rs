//! Knowledge-base construction
//!
//! A knowledge base is the set of embedded training rows for one
//! combination. Each row's combination fields are joined into one text,
//! embedded once, and stored with the row's target value. Rows that cannot
//! be embedded are skipped; a knowledge base with no records is an error.
//!
//! ```text
//! training rows ──> compose text ──> provider.embed ──> EmbeddingRecord
//!                   (exact | alpha)   (sequential,       (vector, text,
//!                                      batched)           target, meta)
//! ```

mod builder;

pub use builder::{EmbeddingIndexBuilder, TextOrder, FIELD_SEPARATOR};

use crate::cache::BoundedCache;
use crate::combination::ColumnCombination;
use crate::embedding::Embedding;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// One embedded training row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Record identifier (row `id` field when present, else row position)
    pub id: String,
    /// Display name of the owning combination
    pub combination: String,
    /// Embedding vector
    pub vector: Embedding,
    /// Text that produced the vector
    pub text: String,
    /// Expected answer carried by the row
    pub target: String,
    /// Free-form metadata
    pub metadata: Map<String, Value>,
}

/// Ordered embedded records for one combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    combination: ColumnCombination,
    records: Vec<EmbeddingRecord>,
    source_rows: usize,
    dimension: usize,
}

impl KnowledgeBase {
    /// Assemble a knowledge base. `dimension` is the shared vector length.
    #[must_use]
    pub fn new(
        combination: ColumnCombination,
        records: Vec<EmbeddingRecord>,
        source_rows: usize,
    ) -> Self {
        let dimension = records.first().map_or(0, |r| r.vector.len());
        Self {
            combination,
            records,
            source_rows,
            dimension,
        }
    }

    /// Owning combination.
    #[must_use]
    pub const fn combination(&self) -> &ColumnCombination {
        &self.combination
    }

    /// Records in insertion order.
    #[must_use]
    pub fn records(&self) -> &[EmbeddingRecord] {
        &self.records
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of rows the build started from.
    #[must_use]
    pub const fn source_rows(&self) -> usize {
        self.source_rows
    }

    /// Rows that were skipped during the build.
    #[must_use]
    pub fn skipped_rows(&self) -> usize {
        self.source_rows.saturating_sub(self.records.len())
    }

    /// Shared vector dimension (0 when empty).
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Cache key for a built knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KnowledgeBaseKey {
    /// Combination display name
    pub combination: String,
    /// Number of source rows
    pub row_count: usize,
    /// Split seed
    pub seed: u64,
}

impl KnowledgeBaseKey {
    /// Build a key.
    #[must_use]
    pub fn new(combination: &ColumnCombination, row_count: usize, seed: u64) -> Self {
        Self {
            combination: combination.name().to_string(),
            row_count,
            seed,
        }
    }
}

/// Bounded cache of knowledge bases, owned by the orchestrator.
pub type KnowledgeBaseCache = BoundedCache<KnowledgeBaseKey, Arc<KnowledgeBase>>;
