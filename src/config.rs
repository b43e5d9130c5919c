//! Experiment configuration
//!
//! Every field has a default, so a JSON document only needs the fields it
//! changes:
//!
//! ```rust
//! use combo_eval::config::ExperimentConfig;
//!
//! let config = ExperimentConfig::from_json_str(
//!     r#"{
//!         "table": "faq",
//!         "candidate_fields": ["title", "content", "tags"],
//!         "query_field": "question",
//!         "target_field": "answer",
//!         "metric": "similarity"
//!     }"#,
//! )?;
//! assert_eq!(config.max_combinations, 20);
//! config.validate()?;
//! # Ok::<(), combo_eval::Error>(())
//! ```

use crate::combination::MAX_COMBINATION_FIELDS;
use crate::cross_validation::CrossValidationConfig;
use crate::evaluation::LengthFilter;
use crate::index::TextOrder;
use crate::metric::MetricRegistry;
use crate::sampler::DEFAULT_SEED;
use crate::split::{FallbackMode, FetchMode, SplitConfig, SplitStrategy};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Settings for one experiment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Source table
    pub table: String,
    /// Fields the caller may combine
    pub candidate_fields: Vec<String>,
    /// Fields actually combined; all candidates when empty
    pub selected_fields: Vec<String>,
    /// Field holding the query text of evaluation rows
    pub query_field: String,
    /// Field holding the expected answer
    pub target_field: String,
    /// Upper bound on evaluated combinations
    pub max_combinations: usize,
    /// Split seed
    pub seed: u64,
    /// Segment sizes
    pub split: SplitConfig,
    /// Full or sampled fetch
    pub fetch: FetchMode,
    /// Splitting strategy
    pub strategy: SplitStrategy,
    /// Behavior when the strategy cannot split
    pub fallback: FallbackMode,
    /// Metric key
    pub metric: String,
    /// Matches retrieved per query
    pub top_k: usize,
    /// Field concatenation order
    pub text_order: TextOrder,
    /// Rows embedded per batch
    pub batch_size: usize,
    /// Pause between batches, in milliseconds
    pub batch_pause_ms: Option<u64>,
    /// Length bounds on evaluation rows
    pub length_filter: LengthFilter,
    /// Cross-validation; skipped when absent
    pub cross_validation: Option<CrossValidationConfig>,
    /// Knowledge-base cache capacity (0 disables caching)
    pub cache_capacity: usize,
    /// Evaluate the validation segment
    pub evaluate_validation: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            table: String::new(),
            candidate_fields: Vec::new(),
            selected_fields: Vec::new(),
            query_field: "question".to_string(),
            target_field: "answer".to_string(),
            max_combinations: 20,
            seed: DEFAULT_SEED,
            split: SplitConfig::default(),
            fetch: FetchMode::default(),
            strategy: SplitStrategy::default(),
            fallback: FallbackMode::default(),
            metric: "regulatory".to_string(),
            top_k: 1,
            text_order: TextOrder::default(),
            batch_size: 10,
            batch_pause_ms: None,
            length_filter: LengthFilter::default(),
            cross_validation: None,
            cache_capacity: 64,
            evaluate_validation: true,
        }
    }
}

impl ExperimentConfig {
    /// Config for `table` combining `fields`, with defaults elsewhere.
    #[must_use]
    pub fn new<I, S>(table: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table: table.into(),
            candidate_fields: fields.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Parse a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` for malformed JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read, or `Error::Json`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Fields to enumerate combinations from.
    #[must_use]
    pub fn effective_fields(&self) -> &[String] {
        if self.selected_fields.is_empty() {
            &self.candidate_fields
        } else {
            &self.selected_fields
        }
    }

    /// Batch pause as a duration.
    #[must_use]
    pub fn batch_pause(&self) -> Option<Duration> {
        self.batch_pause_ms.map(Duration::from_millis)
    }

    /// Check the config without touching data.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let config_error = |msg: String| Err(Error::Configuration(msg));

        if self.table.trim().is_empty() {
            return config_error("table must not be empty".to_string());
        }
        if self.query_field.trim().is_empty() || self.target_field.trim().is_empty() {
            return config_error("query_field and target_field must not be empty".to_string());
        }
        if self.effective_fields().is_empty() {
            return config_error("no fields to combine".to_string());
        }
        if !self.candidate_fields.is_empty() {
            if let Some(field) = self
                .selected_fields
                .iter()
                .find(|f| !self.candidate_fields.contains(f))
            {
                return config_error(format!("selected field '{field}' is not a candidate field"));
            }
        }
        if self.effective_fields().len() > MAX_COMBINATION_FIELDS {
            tracing::warn!(
                fields = self.effective_fields().len(),
                max = MAX_COMBINATION_FIELDS,
                "only the first fields are combined"
            );
        }
        if self.max_combinations == 0 {
            return config_error("max_combinations must be at least 1".to_string());
        }
        if self.batch_size < 1 {
            return config_error("batch_size must be at least 1".to_string());
        }
        if self.top_k < 1 {
            return config_error("top_k must be at least 1".to_string());
        }
        if let Some(cv) = &self.cross_validation {
            if cv.folds < 2 {
                return config_error(format!(
                    "cross-validation needs at least 2 folds, got {}",
                    cv.folds
                ));
            }
        }
        if let Some(field) = self.strategy.field() {
            if field.trim().is_empty() {
                return config_error(format!(
                    "split strategy '{}' needs a field",
                    self.strategy.name()
                ));
            }
        }
        if let FetchMode::Sample { offset_fraction } = self.fetch {
            if !(0.0..1.0).contains(&offset_fraction) {
                return config_error(format!(
                    "sample offset_fraction must be in [0, 1), got {offset_fraction}"
                ));
            }
        }

        self.split.validate()?;
        self.length_filter.validate()?;
        MetricRegistry::canonical_key(&self.metric)?;
        Ok(())
    }
}
