//! K-fold cross-validation over the training rows.
//!
//! Folds are contiguous slices in row order. Fold `i` is held out while a
//! temporary knowledge base is built from the other folds; the held-out
//! rows are then evaluated and their mean score recorded. Temporary
//! knowledge bases are never cached.

use crate::cancel::CancelSignal;
use crate::combination::ColumnCombination;
use crate::embedding::EmbeddingProvider;
use crate::evaluation::{mean_score, RowEvaluator};
use crate::index::EmbeddingIndexBuilder;
use crate::row::Row;
use crate::stats;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::{debug, warn};

/// Default number of folds.
pub const DEFAULT_FOLDS: usize = 5;

/// Cross-validation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossValidationConfig {
    /// Number of folds (at least 2)
    pub folds: usize,
}

impl Default for CrossValidationConfig {
    fn default() -> Self {
        Self {
            folds: DEFAULT_FOLDS,
        }
    }
}

/// Contiguous fold ranges over `n` rows.
///
/// Each fold has `n / k` rows; the first `n % k` folds get one more.
///
/// ```
/// use combo_eval::cross_validation::fold_ranges;
///
/// assert_eq!(fold_ranges(7, 3), vec![0..3, 3..5, 5..7]);
/// ```
#[must_use]
pub fn fold_ranges(n: usize, k: usize) -> Vec<Range<usize>> {
    if k == 0 {
        return Vec::new();
    }
    let base = n / k;
    let extra = n % k;
    let mut start = 0;
    (0..k)
        .map(|i| {
            let len = base + usize::from(i < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

/// Runs K-fold cross-validation.
#[derive(Debug, Clone, Copy)]
pub struct CrossValidator {
    folds: usize,
}

impl CrossValidator {
    /// Create a validator with `folds` folds.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if `folds < 2`.
    pub fn new(folds: usize) -> Result<Self> {
        if folds < 2 {
            return Err(Error::Configuration(format!(
                "cross-validation needs at least 2 folds, got {folds}"
            )));
        }
        Ok(Self { folds })
    }

    /// Build from config.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn from_config(config: &CrossValidationConfig) -> Result<Self> {
        Self::new(config.folds)
    }

    /// Number of folds.
    #[must_use]
    pub const fn folds(&self) -> usize {
        self.folds
    }

    /// Mean score per completed fold, in fold order.
    ///
    /// Folds with an empty side, a failed build, or no evaluated queries are
    /// skipped, so the result may hold fewer than `k` scores.
    ///
    /// # Errors
    ///
    /// Returns `Error::Cancelled` if the signal fires.
    pub async fn run<P: EmbeddingProvider>(
        &self,
        builder: &EmbeddingIndexBuilder,
        evaluator: &RowEvaluator,
        provider: &P,
        combination: &ColumnCombination,
        rows: &[Row],
        cancel: &CancelSignal,
    ) -> Result<Vec<f64>> {
        let mut scores = Vec::with_capacity(self.folds);

        for (fold, range) in fold_ranges(rows.len(), self.folds).into_iter().enumerate() {
            cancel.check()?;

            let held_out = &rows[range.clone()];
            let training: Vec<Row> = rows[..range.start]
                .iter()
                .chain(&rows[range.end..])
                .cloned()
                .collect();

            if held_out.is_empty() || training.is_empty() {
                debug!(combination = %combination, fold, "skipping fold with an empty side");
                continue;
            }

            let kb = match builder.build(provider, combination, &training, cancel).await {
                Ok(kb) => kb,
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    warn!(combination = %combination, fold, error = %e, "fold build failed");
                    continue;
                }
            };

            let results = evaluator.evaluate(provider, &kb, held_out, cancel).await?;
            match mean_score(&results) {
                Some(score) => {
                    debug!(
                        combination = %combination,
                        fold,
                        score,
                        held_out = held_out.len(),
                        "fold scored"
                    );
                    scores.push(score);
                }
                None => warn!(combination = %combination, fold, "fold produced no scores"),
            }
        }

        Ok(scores)
    }
}

/// Mean and spread of fold scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationStats {
    /// Mean fold score
    pub mean: f64,
    /// Sample standard deviation (0 for one fold)
    pub std_dev: f64,
    /// Number of scored folds
    pub folds: usize,
}

impl CrossValidationStats {
    /// Summarize fold scores, `None` when there are none.
    #[must_use]
    pub fn from_scores(scores: &[f64]) -> Option<Self> {
        Some(Self {
            mean: stats::mean(scores)?,
            std_dev: stats::std_dev(scores).unwrap_or(0.0),
            folds: scores.len(),
        })
    }
}
