//! Experiment Report - everything one run produced

use super::{CombinationFailure, CombinationResult, ExperimentSummary};
use crate::config::ExperimentConfig;
use crate::split::SplitStats;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Serializable outcome of one experiment run.
///
/// Writing it to durable storage is up to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentReport {
    /// Run identifier
    pub experiment_id: String,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub ended_at: DateTime<Utc>,
    /// Config the run used
    pub config: ExperimentConfig,
    /// Segment sizes and split strategy
    pub split: SplitStats,
    /// Results in evaluation order
    pub results: Vec<CombinationResult>,
    /// Combinations excluded from the results
    pub failures: Vec<CombinationFailure>,
    /// Cross-combination summary
    pub summary: ExperimentSummary,
}

impl ExperimentReport {
    /// Result of the best combination.
    #[must_use]
    pub fn best_result(&self) -> Option<&CombinationResult> {
        self.results
            .iter()
            .find(|r| r.combination().name() == self.summary.best_combination)
    }

    /// Run duration in seconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_seconds(&self) -> f64 {
        (self.ended_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a report from JSON.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` for malformed input.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
