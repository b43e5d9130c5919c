//! Embedding index builder.

use super::{EmbeddingRecord, KnowledgeBase, KnowledgeBaseCache, KnowledgeBaseKey};
use crate::cancel::CancelSignal;
use crate::combination::ColumnCombination;
use crate::embedding::EmbeddingProvider;
use crate::row::Row;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Token placed between field values when composing a row's text.
pub const FIELD_SEPARATOR: &str = " | ";

/// Order in which combination fields are concatenated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextOrder {
    /// Combination order, as selected by the caller
    #[default]
    Exact,
    /// Field names sorted alphabetically
    Alphabetical,
}

/// Builds knowledge bases from training rows.
#[derive(Debug, Clone)]
pub struct EmbeddingIndexBuilder {
    target_field: String,
    text_order: TextOrder,
    batch_size: usize,
    batch_pause: Option<Duration>,
}

impl EmbeddingIndexBuilder {
    /// Create a builder reading expected answers from `target_field`.
    #[must_use]
    pub fn new(target_field: impl Into<String>) -> Self {
        Self {
            target_field: target_field.into(),
            text_order: TextOrder::Exact,
            batch_size: 10,
            batch_pause: None,
        }
    }

    /// Set the field concatenation order.
    #[must_use]
    pub const fn text_order(mut self, order: TextOrder) -> Self {
        self.text_order = order;
        self
    }

    /// Rows per batch (minimum 1).
    #[must_use]
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Pause between row batches.
    #[must_use]
    pub const fn batch_pause(mut self, pause: Option<Duration>) -> Self {
        self.batch_pause = pause;
        self
    }

    /// Field holding each row's expected answer.
    #[must_use]
    pub fn target_field(&self) -> &str {
        &self.target_field
    }

    /// Compose the embedding text for a row.
    ///
    /// Null and missing values are dropped; `None` if nothing is left.
    #[must_use]
    pub fn compose_text(&self, combination: &ColumnCombination, row: &Row) -> Option<String> {
        let mut fields: Vec<&str> = combination.fields().iter().map(String::as_str).collect();
        if self.text_order == TextOrder::Alphabetical {
            fields.sort_unstable();
        }

        let parts: Vec<String> = fields.iter().filter_map(|f| row.text(f)).collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(FIELD_SEPARATOR))
        }
    }

    /// Embed `rows` into a knowledge base.
    ///
    /// # Errors
    ///
    /// Returns `Error::Cancelled` if the signal fires, or `Error::Combination`
    /// if no row produced a record.
    pub async fn build<P: EmbeddingProvider>(
        &self,
        provider: &P,
        combination: &ColumnCombination,
        rows: &[Row],
        cancel: &CancelSignal,
    ) -> Result<KnowledgeBase> {
        let mut records: Vec<EmbeddingRecord> = Vec::with_capacity(rows.len());
        let mut dimension: Option<usize> = None;
        let batches = rows.len().div_ceil(self.batch_size);

        for (batch_index, batch) in rows.chunks(self.batch_size).enumerate() {
            if batch_index > 0 {
                if let Some(pause) = self.batch_pause {
                    tokio::time::sleep(pause).await;
                }
            }

            for (offset, row) in batch.iter().enumerate() {
                cancel.check()?;
                let index = batch_index * self.batch_size + offset;
                match self.embed_row(provider, combination, row, index, dimension).await {
                    Ok(record) => {
                        dimension.get_or_insert(record.vector.len());
                        records.push(record);
                    }
                    Err(e) => {
                        warn!(combination = %combination, row = index, error = %e, "skipping row");
                    }
                }
            }

            debug!(
                combination = %combination,
                batch = batch_index + 1,
                batches,
                records = records.len(),
                "embedded batch"
            );
        }

        if records.is_empty() {
            return Err(Error::combination(
                combination.name(),
                format!("no usable training rows out of {}", rows.len()),
            ));
        }

        info!(
            combination = %combination,
            records = records.len(),
            skipped = rows.len() - records.len(),
            "built knowledge base"
        );
        Ok(KnowledgeBase::new(combination.clone(), records, rows.len()))
    }

    /// Like [`build`](Self::build), reusing a cached knowledge base for the
    /// same `(combination, row count, seed)`.
    ///
    /// # Errors
    ///
    /// Same as [`build`](Self::build).
    pub async fn build_cached<P: EmbeddingProvider>(
        &self,
        provider: &P,
        combination: &ColumnCombination,
        rows: &[Row],
        seed: u64,
        cache: &mut KnowledgeBaseCache,
        cancel: &CancelSignal,
    ) -> Result<Arc<KnowledgeBase>> {
        let key = KnowledgeBaseKey::new(combination, rows.len(), seed);
        if let Some(kb) = cache.get(&key) {
            debug!(combination = %combination, "knowledge base cache hit");
            return Ok(Arc::clone(kb));
        }

        let kb = Arc::new(self.build(provider, combination, rows, cancel).await?);
        cache.insert(key, Arc::clone(&kb));
        Ok(kb)
    }

    async fn embed_row<P: EmbeddingProvider>(
        &self,
        provider: &P,
        combination: &ColumnCombination,
        row: &Row,
        index: usize,
        dimension: Option<usize>,
    ) -> Result<EmbeddingRecord> {
        let text = self
            .compose_text(combination, row)
            .ok_or_else(|| Error::Row("empty generated text".to_string()))?;
        let target = row.text(&self.target_field).ok_or_else(|| {
            Error::Row(format!("missing target field '{}'", self.target_field))
        })?;

        let vector = provider
            .embed(&text)
            .await
            .map_err(|e| Error::Row(format!("embedding failed: {e}")))?;

        if vector.is_empty() {
            return Err(Error::Row("provider returned an empty vector".to_string()));
        }
        if let Some(expected) = dimension {
            if vector.len() != expected {
                return Err(Error::Row(format!(
                    "dimension {} does not match knowledge base dimension {expected}",
                    vector.len()
                )));
            }
        }

        let id = row.text("id").unwrap_or_else(|| index.to_string());
        let mut metadata = Map::new();
        metadata.insert("row_index".to_string(), Value::from(index));

        Ok(EmbeddingRecord {
            id,
            combination: combination.name().to_string(),
            vector,
            text,
            target,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::BoundedCache;
    use crate::embedding::{Embedding, HashEmbeddingProvider};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails on any text containing "boom" and counts calls.
    struct FlakyProvider {
        inner: HashEmbeddingProvider,
        calls: AtomicUsize,
    }

    impl EmbeddingProvider for FlakyProvider {
        async fn embed(&self, text: &str) -> anyhow::Result<Embedding> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text.contains("boom") {
                anyhow::bail!("provider exploded");
            }
            Ok(self.inner.embed_sync(text))
        }
    }

    fn flaky() -> FlakyProvider {
        FlakyProvider {
            inner: HashEmbeddingProvider::new(16),
            calls: AtomicUsize::new(0),
        }
    }

    fn row(title: &str, content: Option<&str>, answer: &str) -> Row {
        let mut row = Row::new().with("title", title).with("answer", answer);
        if let Some(content) = content {
            row.insert("content", content);
        }
        row
    }

    #[test]
    fn test_compose_text_orders() {
        let combo = ColumnCombination::new(["title", "content"]);
        let r = row("T", Some("C"), "A");

        let exact = EmbeddingIndexBuilder::new("answer");
        assert_eq!(exact.compose_text(&combo, &r).as_deref(), Some("T | C"));

        let alpha = EmbeddingIndexBuilder::new("answer").text_order(TextOrder::Alphabetical);
        assert_eq!(alpha.compose_text(&combo, &r).as_deref(), Some("C | T"));
    }

    #[test]
    fn test_compose_text_drops_nulls() {
        let combo = ColumnCombination::new(["title", "content"]);
        let builder = EmbeddingIndexBuilder::new("answer");
        assert_eq!(
            builder.compose_text(&combo, &row("T", None, "A")).as_deref(),
            Some("T")
        );
        assert_eq!(builder.compose_text(&combo, &row("", None, "A")), None);
    }

    #[tokio::test]
    async fn test_build_skips_failed_rows() {
        let provider = flaky();
        let rows = vec![
            row("alpha", None, "a1"),
            row("boom", None, "a2"),
            row("", None, "a3"),
            row("gamma", None, "a4"),
        ];
        let combo = ColumnCombination::new(["title"]);
        let kb = EmbeddingIndexBuilder::new("answer")
            .batch_size(2)
            .build(&provider, &combo, &rows, &CancelSignal::never())
            .await
            .unwrap();

        assert_eq!(kb.len(), 2);
        assert_eq!(kb.source_rows(), 4);
        assert_eq!(kb.skipped_rows(), 2);
        assert_eq!(kb.dimension(), 16);
        assert_eq!(kb.records()[1].target, "a4");
        // empty-text row never reaches the provider
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_build_empty_is_combination_error() {
        let rows = vec![row("boom", None, "a")];
        let err = EmbeddingIndexBuilder::new("answer")
            .build(&flaky(), &ColumnCombination::new(["title"]), &rows, &CancelSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Combination { .. }));
    }

    #[tokio::test]
    async fn test_build_cancelled() {
        let (handle, signal) = crate::cancel::cancel_pair();
        handle.cancel();
        let rows = vec![row("alpha", None, "a")];
        let err = EmbeddingIndexBuilder::new("answer")
            .build(&flaky(), &ColumnCombination::new(["title"]), &rows, &signal)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn test_build_cached_reuses() {
        let provider = flaky();
        let rows = vec![row("alpha", None, "a"), row("beta", None, "b")];
        let combo = ColumnCombination::new(["title"]);
        let builder = EmbeddingIndexBuilder::new("answer");
        let mut cache = BoundedCache::new(4);

        let first = builder
            .build_cached(&provider, &combo, &rows, 42, &mut cache, &CancelSignal::never())
            .await
            .unwrap();
        let second = builder
            .build_cached(&provider, &combo, &rows, 42, &mut cache, &CancelSignal::never())
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

        builder
            .build_cached(&provider, &combo, &rows, 7, &mut cache, &CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 4);
    }
}
