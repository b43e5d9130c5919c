//! Combination Result - evaluation outcome for one field combination

use crate::combination::ColumnCombination;
use crate::evaluation::QueryEvalResult;
use crate::metric::contextual_relevance;
use crate::stats::{self, ConfidenceInterval};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Wall-clock seconds spent per phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseTimings {
    /// Knowledge-base build
    pub build_seconds: f64,
    /// Cross-validation
    pub cross_validation_seconds: f64,
    /// Validation-segment evaluation
    pub validation_seconds: f64,
    /// Testing-segment evaluation
    pub testing_seconds: f64,
}

impl PhaseTimings {
    /// Sum of all phases.
    #[must_use]
    pub fn total_seconds(&self) -> f64 {
        self.build_seconds
            + self.cross_validation_seconds
            + self.validation_seconds
            + self.testing_seconds
    }
}

/// Row counts observed while evaluating a combination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQuality {
    /// Training rows offered to the builder
    pub training_rows: usize,
    /// Records in the knowledge base
    pub knowledge_base_records: usize,
    /// Training rows skipped by the builder
    pub skipped_training_rows: usize,
    /// Testing rows before the length filter
    pub test_rows: usize,
    /// Testing rows rejected by the length filter
    pub filtered_test_rows: usize,
    /// Queries that produced a score
    pub evaluated_queries: usize,
    /// Queries skipped during evaluation
    pub skipped_queries: usize,
}

/// Queries per second; 0 when no time was measured.
///
/// ```
/// use combo_eval::experiment::throughput;
///
/// assert_eq!(throughput(10, 2.0), 5.0);
/// assert_eq!(throughput(10, 0.0), 0.0);
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn throughput(count: usize, seconds: f64) -> f64 {
    if seconds > 0.0 && seconds.is_finite() {
        count as f64 / seconds
    } else {
        0.0
    }
}

/// Evaluation outcome for one combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinationResult {
    combination: ColumnCombination,
    mean_score: f64,
    test_count: usize,
    cv_scores: Option<Vec<f64>>,
    confidence_interval: Option<ConfidenceInterval>,
    confidence: Option<f64>,
    timings: PhaseTimings,
    throughput: f64,
    data_quality: DataQuality,
    validation_score: Option<f64>,
    query_results: Vec<QueryEvalResult>,
}

impl CombinationResult {
    /// Create a builder from the testing-segment results.
    #[must_use]
    pub fn builder(
        combination: ColumnCombination,
        query_results: Vec<QueryEvalResult>,
    ) -> CombinationResultBuilder {
        CombinationResultBuilder::new(combination, query_results)
    }

    /// Evaluated combination.
    #[must_use]
    pub const fn combination(&self) -> &ColumnCombination {
        &self.combination
    }

    /// Mean testing score.
    #[must_use]
    pub const fn mean_score(&self) -> f64 {
        self.mean_score
    }

    /// Number of scored testing queries.
    #[must_use]
    pub const fn test_count(&self) -> usize {
        self.test_count
    }

    /// Fold scores, if cross-validation ran.
    #[must_use]
    pub fn cv_scores(&self) -> Option<&[f64]> {
        self.cv_scores.as_deref()
    }

    /// Mean fold score, if any fold was scored.
    #[must_use]
    pub fn cv_mean(&self) -> Option<f64> {
        self.cv_scores.as_deref().and_then(stats::mean)
    }

    /// 95% interval around the mean testing score.
    #[must_use]
    pub const fn confidence_interval(&self) -> Option<ConfidenceInterval> {
        self.confidence_interval
    }

    /// Mean retrieval confidence, `(similarity + 1) / 2` over queries.
    #[must_use]
    pub const fn confidence(&self) -> Option<f64> {
        self.confidence
    }

    /// Per-phase timings.
    #[must_use]
    pub const fn timings(&self) -> PhaseTimings {
        self.timings
    }

    /// Testing queries per second.
    #[must_use]
    pub const fn throughput(&self) -> f64 {
        self.throughput
    }

    /// Data-quality snapshot.
    #[must_use]
    pub const fn data_quality(&self) -> DataQuality {
        self.data_quality
    }

    /// Mean validation score, if the validation segment was evaluated.
    #[must_use]
    pub const fn validation_score(&self) -> Option<f64> {
        self.validation_score
    }

    /// Per-query testing results.
    #[must_use]
    pub fn query_results(&self) -> &[QueryEvalResult] {
        &self.query_results
    }
}

/// Builder for `CombinationResult`.
#[derive(Debug)]
pub struct CombinationResultBuilder {
    combination: ColumnCombination,
    query_results: Vec<QueryEvalResult>,
    cv_scores: Option<Vec<f64>>,
    timings: PhaseTimings,
    data_quality: DataQuality,
    validation_score: Option<f64>,
}

impl CombinationResultBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(combination: ColumnCombination, query_results: Vec<QueryEvalResult>) -> Self {
        Self {
            combination,
            query_results,
            cv_scores: None,
            timings: PhaseTimings::default(),
            data_quality: DataQuality::default(),
            validation_score: None,
        }
    }

    /// Set the cross-validation fold scores.
    #[must_use]
    pub fn cv_scores(mut self, scores: Vec<f64>) -> Self {
        self.cv_scores = Some(scores);
        self
    }

    /// Set the validation score.
    #[must_use]
    pub const fn validation_score(mut self, score: Option<f64>) -> Self {
        self.validation_score = score;
        self
    }

    /// Set the phase timings.
    #[must_use]
    pub const fn timings(mut self, timings: PhaseTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Set the data-quality snapshot.
    #[must_use]
    pub const fn data_quality(mut self, data_quality: DataQuality) -> Self {
        self.data_quality = data_quality;
        self
    }

    /// Build the `CombinationResult`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Combination` when there are no query results.
    pub fn build(self) -> Result<CombinationResult> {
        let scores: Vec<f64> = self.query_results.iter().map(|r| r.score).collect();
        let mean_score = stats::mean(&scores).ok_or_else(|| {
            Error::combination(self.combination.name(), "no testing queries were scored")
        })?;

        let relevances: Vec<f64> = self
            .query_results
            .iter()
            .map(|r| contextual_relevance(r.similarity))
            .collect();

        let test_count = self.query_results.len();
        Ok(CombinationResult {
            mean_score,
            test_count,
            confidence_interval: ConfidenceInterval::from_samples(&scores),
            confidence: stats::mean(&relevances),
            throughput: throughput(test_count, self.timings.testing_seconds),
            combination: self.combination,
            cv_scores: self.cv_scores,
            timings: self.timings,
            data_quality: self.data_quality,
            validation_score: self.validation_score,
            query_results: self.query_results,
        })
    }
}

/// A combination excluded from the results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinationFailure {
    /// Combination display name
    pub combination: String,
    /// Why it failed
    pub reason: String,
}
