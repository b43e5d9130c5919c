//! Cross-combination summary statistics

use super::CombinationResult;
use crate::stats;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Aggregate view over every evaluated combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSummary {
    /// Combination with the highest mean score
    pub best_combination: String,
    /// Its mean score
    pub best_score: f64,
    /// Combination with the lowest mean score
    pub worst_combination: String,
    /// Its mean score
    pub worst_score: f64,
    /// Mean of per-combination means
    pub mean_score: f64,
    /// Median of per-combination means
    pub median_score: f64,
    /// First quartile
    pub q1_score: f64,
    /// Third quartile
    pub q3_score: f64,
    /// Mean reported confidence, over results that report one
    pub mean_confidence: Option<f64>,
    /// Mean of per-combination cross-validation means
    pub cv_mean: Option<f64>,
    /// Standard deviation of per-combination cross-validation means
    pub cv_std: Option<f64>,
    /// Highest cross-validation mean
    pub best_cv_mean: Option<f64>,
    /// Lowest cross-validation mean
    pub worst_cv_mean: Option<f64>,
    /// Combinations with results
    pub evaluated_combinations: usize,
    /// Combinations that failed
    pub failed_combinations: usize,
}

/// Computes an [`ExperimentSummary`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryAggregator;

impl SummaryAggregator {
    /// Summarize `results`. Ties for best or worst go to the earlier result.
    ///
    /// # Errors
    ///
    /// Returns `Error::Experiment` for an empty result list.
    pub fn aggregate(results: &[CombinationResult]) -> Result<ExperimentSummary> {
        let first = results
            .first()
            .ok_or_else(|| Error::Experiment("no combination produced results".to_string()))?;

        let (mut best, mut worst) = (first, first);
        for result in &results[1..] {
            if result.mean_score() > best.mean_score() {
                best = result;
            }
            if result.mean_score() < worst.mean_score() {
                worst = result;
            }
        }

        let means: Vec<f64> = results.iter().map(CombinationResult::mean_score).collect();
        let confidences: Vec<f64> = results
            .iter()
            .filter_map(CombinationResult::confidence)
            .collect();
        let cv_means: Vec<f64> = results.iter().filter_map(CombinationResult::cv_mean).collect();

        // non-empty: percentile only fails on empty input
        let quantile = |p: f64| stats::percentile(&means, p).unwrap_or(first.mean_score());

        Ok(ExperimentSummary {
            best_combination: best.combination().name().to_string(),
            best_score: best.mean_score(),
            worst_combination: worst.combination().name().to_string(),
            worst_score: worst.mean_score(),
            mean_score: stats::mean(&means).unwrap_or(first.mean_score()),
            median_score: quantile(50.0),
            q1_score: quantile(25.0),
            q3_score: quantile(75.0),
            mean_confidence: stats::mean(&confidences),
            cv_mean: stats::mean(&cv_means),
            cv_std: stats::std_dev(&cv_means),
            best_cv_mean: cv_means.iter().copied().reduce(f64::max),
            worst_cv_mean: cv_means.iter().copied().reduce(f64::min),
            evaluated_combinations: results.len(),
            failed_combinations: 0,
        })
    }
}
