//! Query evaluation: retrieve, then score.
//!
//! Each evaluation row supplies a query and an expected answer. The query is
//! embedded, matched against the knowledge base, and the retrieved target is
//! scored by the configured [`Metric`]. Rows that cannot be evaluated are
//! skipped and logged.

use crate::cancel::CancelSignal;
use crate::embedding::EmbeddingProvider;
use crate::index::KnowledgeBase;
use crate::matcher::NearestNeighborMatcher;
use crate::metric::Metric;
use crate::row::Row;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of evaluating one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryEvalResult {
    /// Query text
    pub query: String,
    /// Expected answer
    pub expected: String,
    /// Target of the best match
    pub retrieved: String,
    /// Targets of all top-k matches, best first
    pub candidates: Vec<String>,
    /// Cosine similarity of the best match
    pub similarity: f32,
    /// Metric overall score
    pub score: f64,
    /// Metric breakdown
    pub breakdown: BTreeMap<String, f64>,
}

/// Mean score over results, `None` when empty.
#[must_use]
pub fn mean_score(results: &[QueryEvalResult]) -> Option<f64> {
    let scores: Vec<f64> = results.iter().map(|r| r.score).collect();
    crate::stats::mean(&scores)
}

/// Character-length bounds on queries and expected answers.
///
/// Applied to evaluation rows before matching. Unset bounds do not filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LengthFilter {
    /// Minimum query length
    pub min_query_len: Option<usize>,
    /// Maximum query length
    pub max_query_len: Option<usize>,
    /// Minimum answer length
    pub min_answer_len: Option<usize>,
    /// Maximum answer length
    pub max_answer_len: Option<usize>,
}

fn within(len: usize, min: Option<usize>, max: Option<usize>) -> bool {
    min.map_or(true, |m| len >= m) && max.map_or(true, |m| len <= m)
}

impl LengthFilter {
    /// Check that every minimum is at most its maximum.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for inverted bounds.
    pub fn validate(&self) -> Result<()> {
        let pairs = [
            ("query", self.min_query_len, self.max_query_len),
            ("answer", self.min_answer_len, self.max_answer_len),
        ];
        for (what, min, max) in pairs {
            if let (Some(min), Some(max)) = (min, max) {
                if min > max {
                    return Err(Error::Configuration(format!(
                        "invalid {what} length bounds: min {min} > max {max}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Whether any bound is set.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.min_query_len.is_some()
            || self.max_query_len.is_some()
            || self.min_answer_len.is_some()
            || self.max_answer_len.is_some()
    }

    /// Whether a (query, answer) pair passes.
    #[must_use]
    pub fn accepts(&self, query: &str, answer: &str) -> bool {
        within(query.chars().count(), self.min_query_len, self.max_query_len)
            && within(answer.chars().count(), self.min_answer_len, self.max_answer_len)
    }

    /// Split rows into (kept, rejected count). Missing fields count as empty.
    #[must_use]
    pub fn apply(&self, rows: &[Row], query_field: &str, answer_field: &str) -> (Vec<Row>, usize) {
        if !self.is_active() {
            return (rows.to_vec(), 0);
        }

        let kept: Vec<Row> = rows
            .iter()
            .filter(|row| {
                let query = row.text(query_field).unwrap_or_default();
                let answer = row.text(answer_field).unwrap_or_default();
                self.accepts(&query, &answer)
            })
            .cloned()
            .collect();

        let rejected = rows.len() - kept.len();
        if rejected > 0 {
            warn!(rejected, kept = kept.len(), "length filter rejected rows");
        }
        (kept, rejected)
    }
}

/// Evaluates rows against a knowledge base.
#[derive(Debug, Clone)]
pub struct RowEvaluator {
    query_field: String,
    target_field: String,
    top_k: usize,
    metric: Arc<dyn Metric>,
    matcher: NearestNeighborMatcher,
}

impl RowEvaluator {
    /// Create an evaluator. `top_k` is at least 1.
    #[must_use]
    pub fn new(
        query_field: impl Into<String>,
        target_field: impl Into<String>,
        top_k: usize,
        metric: Arc<dyn Metric>,
    ) -> Self {
        Self {
            query_field: query_field.into(),
            target_field: target_field.into(),
            top_k: top_k.max(1),
            metric,
            matcher: NearestNeighborMatcher::new(),
        }
    }

    /// Field holding the query text.
    #[must_use]
    pub fn query_field(&self) -> &str {
        &self.query_field
    }

    /// Field holding the expected answer.
    #[must_use]
    pub fn target_field(&self) -> &str {
        &self.target_field
    }

    /// The scoring metric.
    #[must_use]
    pub fn metric(&self) -> &Arc<dyn Metric> {
        &self.metric
    }

    /// Evaluate every row, skipping rows that fail.
    ///
    /// # Errors
    ///
    /// Returns `Error::Cancelled` if the signal fires. Per-row failures are
    /// logged and skipped.
    pub async fn evaluate<P: EmbeddingProvider>(
        &self,
        provider: &P,
        kb: &KnowledgeBase,
        rows: &[Row],
        cancel: &CancelSignal,
    ) -> Result<Vec<QueryEvalResult>> {
        let mut results = Vec::with_capacity(rows.len());

        for (index, row) in rows.iter().enumerate() {
            cancel.check()?;
            match self.evaluate_row(provider, kb, row).await {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!(
                        combination = %kb.combination(),
                        row = index,
                        error = %e,
                        "skipping query"
                    );
                }
            }
        }

        debug!(
            combination = %kb.combination(),
            evaluated = results.len(),
            skipped = rows.len() - results.len(),
            "evaluated queries"
        );
        Ok(results)
    }

    async fn evaluate_row<P: EmbeddingProvider>(
        &self,
        provider: &P,
        kb: &KnowledgeBase,
        row: &Row,
    ) -> Result<QueryEvalResult> {
        let query = row
            .text(&self.query_field)
            .ok_or_else(|| Error::Row(format!("missing query field '{}'", self.query_field)))?;
        let expected = row
            .text(&self.target_field)
            .ok_or_else(|| Error::Row(format!("missing target field '{}'", self.target_field)))?;

        let matches = self.matcher.find(provider, kb, &query, self.top_k).await?;
        let best = matches
            .first()
            .ok_or_else(|| Error::Row("knowledge base returned no match".to_string()))?;

        let score = self
            .metric
            .calculate(&expected, &best.record.target, best.similarity);

        Ok(QueryEvalResult {
            retrieved: best.record.target.clone(),
            similarity: best.similarity,
            candidates: matches.iter().map(|m| m.record.target.clone()).collect(),
            query,
            expected,
            score: score.overall_score,
            breakdown: score.breakdown,
        })
    }
}
