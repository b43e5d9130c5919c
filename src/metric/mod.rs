//! Pluggable answer-scoring metrics
//!
//! A [`Metric`] compares an expected answer with the retrieved one (plus the
//! retrieval similarity) and returns an overall score in `[0, 1]` with a
//! named breakdown. Metrics are selected by key through [`MetricRegistry`],
//! which caches one shared instance per key.
//!
//! | Key | Metric |
//! |---|---|
//! | `regulatory` | [`RegulatoryMetric`] |
//! | `structured_query`, `sql` | [`StructuredQueryMetric`] |
//! | `similarity` | [`SimilarityMetric`] |

mod regulatory;
mod structured_query;

pub use regulatory::{jaccard, RegulatoryMetric, REGULATORY_CONCEPTS, REGULATORY_KEYWORDS};
pub use structured_query::{balanced_syntax, parse_query, SchemaCatalog, StructuredQueryMetric};

use crate::{Error, Result};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Keys accepted by [`MetricRegistry::get`].
pub const METRIC_KEYS: &[&str] = &["regulatory", "structured_query", "sql", "similarity"];

/// Overall score plus named sub-scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricScore {
    /// Overall score in `[0, 1]`
    pub overall_score: f64,
    /// Named sub-scores
    pub breakdown: BTreeMap<String, f64>,
}

impl MetricScore {
    /// Build a score, clamping the overall value into `[0, 1]`.
    #[must_use]
    pub fn new(overall_score: f64, breakdown: BTreeMap<String, f64>) -> Self {
        let overall_score = if overall_score.is_finite() {
            overall_score.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            overall_score,
            breakdown,
        }
    }
}

/// Answer-scoring metric.
pub trait Metric: Send + Sync + Debug {
    /// Registry key.
    fn key(&self) -> &'static str;

    /// Score `actual` against `expected` given the retrieval similarity.
    fn calculate(&self, expected: &str, actual: &str, similarity: f32) -> MetricScore;
}

/// Map a cosine similarity in `[-1, 1]` onto `[0, 1]`.
#[must_use]
pub fn contextual_relevance(similarity: f32) -> f64 {
    ((f64::from(similarity) + 1.0) / 2.0).clamp(0.0, 1.0)
}

/// Lowercase and collapse whitespace, for exact-match comparison.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether two texts are equal ignoring case and whitespace layout.
#[must_use]
pub fn texts_match(expected: &str, actual: &str) -> bool {
    normalize_text(expected) == normalize_text(actual)
}

/// Similarity-only metric; an exact text match scores 1.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityMetric;

impl Metric for SimilarityMetric {
    fn key(&self) -> &'static str {
        "similarity"
    }

    fn calculate(&self, expected: &str, actual: &str, similarity: f32) -> MetricScore {
        let exact = texts_match(expected, actual);
        let relevance = contextual_relevance(similarity);
        let overall = if exact { 1.0 } else { relevance };

        let mut breakdown = BTreeMap::new();
        breakdown.insert("contextual_relevance".to_string(), relevance);
        breakdown.insert("exact_match".to_string(), if exact { 1.0 } else { 0.0 });
        MetricScore::new(overall, breakdown)
    }
}

/// Resolves metric keys to shared instances.
#[derive(Debug, Default)]
pub struct MetricRegistry {
    catalog: Option<SchemaCatalog>,
    instances: FxHashMap<&'static str, Arc<dyn Metric>>,
}

impl MetricRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `catalog` for structured-query entity and field checks.
    #[must_use]
    pub fn with_catalog(mut self, catalog: SchemaCatalog) -> Self {
        self.catalog = Some(catalog);
        self.instances.clear();
        self
    }

    /// Canonical key for `key`, resolving aliases.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for an unknown key.
    pub fn canonical_key(key: &str) -> Result<&'static str> {
        match key.trim().to_ascii_lowercase().as_str() {
            "regulatory" => Ok("regulatory"),
            "structured_query" | "sql" => Ok("structured_query"),
            "similarity" => Ok("similarity"),
            other => Err(Error::Configuration(format!(
                "unknown metric '{other}' (expected one of: {})",
                METRIC_KEYS.join(", ")
            ))),
        }
    }

    /// Shared metric instance for `key`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for an unknown key.
    pub fn get(&mut self, key: &str) -> Result<Arc<dyn Metric>> {
        let key = Self::canonical_key(key)?;
        if let Some(metric) = self.instances.get(key) {
            return Ok(Arc::clone(metric));
        }

        let metric: Arc<dyn Metric> = match key {
            "regulatory" => Arc::new(RegulatoryMetric::new()),
            "structured_query" => Arc::new(match &self.catalog {
                Some(catalog) => StructuredQueryMetric::with_catalog(catalog.clone()),
                None => StructuredQueryMetric::new(),
            }),
            _ => Arc::new(SimilarityMetric),
        };
        self.instances.insert(key, Arc::clone(&metric));
        Ok(metric)
    }

    /// Number of cached instances.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.instances.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_metric_exact_override() {
        let metric = SimilarityMetric;
        let score = metric.calculate("File  Form A", "file form a", -1.0);
        assert!((score.overall_score - 1.0).abs() < f64::EPSILON);

        let score = metric.calculate("a", "b", 0.0);
        assert!((score.overall_score - 0.5).abs() < 1e-9);
        assert!(score.breakdown["exact_match"].abs() < f64::EPSILON);
    }

    #[test]
    fn test_contextual_relevance_clamps() {
        assert!((contextual_relevance(1.0) - 1.0).abs() < f64::EPSILON);
        assert!(contextual_relevance(-1.0).abs() < f64::EPSILON);
        assert!((contextual_relevance(2.0) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_registry_unknown_key() {
        let err = MetricRegistry::new().get("bleu").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("bleu"));
    }

    #[test]
    fn test_registry_caches_and_aliases() {
        let mut registry = MetricRegistry::new();
        let a = registry.get("sql").unwrap();
        let b = registry.get("structured_query").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.key(), "structured_query");
        registry.get("Regulatory").unwrap();
        assert_eq!(registry.cached(), 2);
    }

    #[test]
    fn test_metric_score_clamps() {
        assert!((MetricScore::new(1.5, BTreeMap::new()).overall_score - 1.0).abs() < f64::EPSILON);
        assert!(MetricScore::new(f64::NAN, BTreeMap::new()).overall_score.abs() < f64::EPSILON);
    }
}
