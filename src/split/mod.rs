//! Reproducible train/validation/test splitting
//!
//! A [`DataSplitter`] fetches rows from a [`RowSource`], computes segment
//! sizes from a [`SplitConfig`], and hands the rows to a [`SplitPolicy`]:
//!
//! | Strategy | Policy | Segments |
//! |---|---|---|
//! | `random` | [`RandomSplit`] | disjoint slices of one seeded shuffle |
//! | `stratified` | [`StratifiedSplit`] | 30/40/30 from short/medium/long length buckets |
//! | `time_based` | [`TimeBasedSplit`] | round robin over time windows, disjoint |
//! | `query_complexity` | [`QueryComplexitySplit`] | 30/40/30 from complexity tertiles |
//!
//! Stratified and complexity segments are drawn independently from the same
//! pools, so a row may appear in more than one segment.
//!
//! When a non-random policy fails (missing field, no parseable timestamps) the
//! [`FallbackMode`] decides between a logged fallback to random splitting and
//! a data error.

mod bucketed;
mod random;
mod time_based;

pub use bucketed::{complexity_score, QueryComplexitySplit, StratifiedSplit, STRUCTURAL_KEYWORDS};
pub use random::RandomSplit;
pub use time_based::{parse_timestamp, TimeBasedSplit, TimeWindow};

use crate::row::Row;
use crate::sampler::SeededSampler;
use crate::source::{RowSource, TableRef};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::{info, warn};

/// Tolerance for ratios summing to 1.
pub const RATIO_TOLERANCE: f64 = 1e-6;

/// How segment sizes are determined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SplitConfig {
    /// Fractions of the fetched rows
    Ratios {
        /// Training fraction
        train: f64,
        /// Validation fraction
        validation: f64,
        /// Testing fraction
        test: f64,
        /// Optional cap on each segment
        #[serde(default)]
        max_samples_per_segment: Option<usize>,
    },
    /// Absolute sizes
    Fixed {
        /// Training rows
        train: usize,
        /// Validation rows
        validation: usize,
        /// Testing rows
        test: usize,
    },
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self::Ratios {
            train: 0.7,
            validation: 0.15,
            test: 0.15,
            max_samples_per_segment: None,
        }
    }
}

/// Number of rows per segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentSizes {
    /// Training rows
    pub training: usize,
    /// Validation rows
    pub validation: usize,
    /// Testing rows
    pub testing: usize,
}

impl SegmentSizes {
    /// Sum of all segments.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.training + self.validation + self.testing
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn floor_fraction(n: usize, fraction: f64) -> usize {
    (n as f64 * fraction).floor() as usize
}

impl SplitConfig {
    /// Check ratios and sizes.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for negative ratios, ratios not summing
    /// to 1, or an empty training/testing segment.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Ratios {
                train,
                validation,
                test,
                max_samples_per_segment,
            } => {
                if [train, validation, test].iter().any(|r| !r.is_finite() || *r < 0.0) {
                    return Err(Error::Configuration(
                        "split ratios must be finite and non-negative".to_string(),
                    ));
                }
                let sum = train + validation + test;
                if (sum - 1.0).abs() > RATIO_TOLERANCE {
                    return Err(Error::Configuration(format!(
                        "split ratios must sum to 1, got {sum}"
                    )));
                }
                if train <= 0.0 || test <= 0.0 {
                    return Err(Error::Configuration(
                        "train and test ratios must be positive".to_string(),
                    ));
                }
                if max_samples_per_segment == Some(0) {
                    return Err(Error::Configuration(
                        "max_samples_per_segment must be at least 1".to_string(),
                    ));
                }
            }
            Self::Fixed { train, test, .. } => {
                if train == 0 || test == 0 {
                    return Err(Error::Configuration(
                        "fixed train and test sizes must be at least 1".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Rows to request from a sampling fetch, `None` when every row is needed.
    #[must_use]
    pub fn requested_count(&self) -> Option<usize> {
        match *self {
            Self::Ratios {
                max_samples_per_segment,
                ..
            } => max_samples_per_segment.map(|max| max.saturating_mul(3)),
            Self::Fixed {
                train,
                validation,
                test,
            } => Some(train + validation + test),
        }
    }

    /// Segment sizes for `available` rows.
    ///
    /// # Errors
    ///
    /// Returns `Error::Data` when fewer rows are available than fixed sizes
    /// require.
    pub fn sizes(&self, available: usize) -> Result<SegmentSizes> {
        match *self {
            Self::Ratios {
                train,
                validation,
                test: _,
                max_samples_per_segment,
            } => {
                let cap = |n: usize| max_samples_per_segment.map_or(n, |max| n.min(max));
                let training = floor_fraction(available, train);
                let validation = floor_fraction(available, validation);
                let testing = available.saturating_sub(training + validation);
                Ok(SegmentSizes {
                    training: cap(training),
                    validation: cap(validation),
                    testing: cap(testing),
                })
            }
            Self::Fixed {
                train,
                validation,
                test,
            } => {
                let sizes = SegmentSizes {
                    training: train,
                    validation,
                    testing: test,
                };
                if available < sizes.total() {
                    return Err(Error::Data(format!(
                        "requested {} rows ({train}/{validation}/{test}) \
                         but only {available} available",
                        sizes.total()
                    )));
                }
                Ok(sizes)
            }
        }
    }
}

/// How rows are fetched from the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FetchMode {
    /// Fetch every row
    #[default]
    Full,
    /// Fetch a window of rows starting at `offset_fraction` of the table
    Sample {
        /// Start of the window in `[0, 1)`
        offset_fraction: f64,
    },
}

/// What to do when a non-random policy cannot split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMode {
    /// Log a warning and split randomly
    #[default]
    Warn,
    /// Fail with a data error
    Error,
}

/// Named splitting strategy, as selected in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum SplitStrategy {
    /// Seeded shuffle and slice
    #[default]
    Random,
    /// Length-stratified sampling on `field`
    Stratified {
        /// Text field whose length defines the buckets
        field: String,
    },
    /// Time-window round robin on `field`
    TimeBased {
        /// Timestamp field
        field: String,
        /// Window granularity
        #[serde(default)]
        window: TimeWindow,
    },
    /// Complexity-tertile sampling on `field`
    QueryComplexity {
        /// Text field that is scored
        field: String,
    },
}

impl SplitStrategy {
    /// Resolve a strategy by name.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for an unknown name or a missing field.
    pub fn from_name(name: &str, field: Option<&str>, window: TimeWindow) -> Result<Self> {
        let field = || {
            field
                .filter(|f| !f.trim().is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    Error::Configuration(format!("split strategy '{name}' needs a field"))
                })
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(Self::Random),
            "stratified" => Ok(Self::Stratified { field: field()? }),
            "time_based" => Ok(Self::TimeBased {
                field: field()?,
                window,
            }),
            "query_complexity" => Ok(Self::QueryComplexity { field: field()? }),
            other => Err(Error::Configuration(format!(
                "unknown split strategy '{other}' \
                 (expected random, stratified, time_based or query_complexity)"
            ))),
        }
    }

    /// Strategy name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Stratified { .. } => "stratified",
            Self::TimeBased { .. } => "time_based",
            Self::QueryComplexity { .. } => "query_complexity",
        }
    }

    /// Field the strategy reads, if any.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Random => None,
            Self::Stratified { field }
            | Self::TimeBased { field, .. }
            | Self::QueryComplexity { field } => Some(field),
        }
    }

    /// Build the policy object.
    #[must_use]
    pub fn policy(&self) -> Box<dyn SplitPolicy> {
        match self {
            Self::Random => Box::new(RandomSplit),
            Self::Stratified { field } => Box::new(StratifiedSplit::new(field.clone())),
            Self::TimeBased { field, window } => {
                Box::new(TimeBasedSplit::new(field.clone(), *window))
            }
            Self::QueryComplexity { field } => Box::new(QueryComplexitySplit::new(field.clone())),
        }
    }
}

/// Training, validation and testing rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segments {
    /// Training rows
    pub training: Vec<Row>,
    /// Validation rows
    pub validation: Vec<Row>,
    /// Testing rows
    pub testing: Vec<Row>,
}

/// Partitions fetched rows into segments.
pub trait SplitPolicy: Send + Sync + Debug {
    /// Strategy name, used in logs and reports.
    fn name(&self) -> &'static str;

    /// Split `rows` into segments of (at most) `sizes`.
    ///
    /// # Errors
    ///
    /// Returns an error when the policy cannot apply to these rows.
    fn split(&self, rows: &[Row], sizes: SegmentSizes, sampler: &SeededSampler) -> Result<Segments>;
}

/// Result of splitting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSplit {
    /// Training rows
    pub training: Vec<Row>,
    /// Validation rows
    pub validation: Vec<Row>,
    /// Testing rows
    pub testing: Vec<Row>,
    /// Name of the policy that produced the segments
    pub strategy: String,
    /// Why the configured policy was replaced by random splitting
    pub fallback_reason: Option<String>,
}

impl DataSplit {
    /// Sizes and strategy, for reports.
    #[must_use]
    pub fn stats(&self) -> SplitStats {
        SplitStats {
            training: self.training.len(),
            validation: self.validation.len(),
            testing: self.testing.len(),
            strategy: self.strategy.clone(),
            fallback_reason: self.fallback_reason.clone(),
        }
    }
}

/// Serializable split summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitStats {
    /// Training rows
    pub training: usize,
    /// Validation rows
    pub validation: usize,
    /// Testing rows
    pub testing: usize,
    /// Policy that produced the segments
    pub strategy: String,
    /// Fallback reason, if the configured policy failed
    pub fallback_reason: Option<String>,
}

/// Fetches rows and splits them.
#[derive(Debug, Clone, Copy)]
pub struct DataSplitter {
    config: SplitConfig,
    fetch: FetchMode,
    fallback: FallbackMode,
    sampler: SeededSampler,
}

impl DataSplitter {
    /// Create a splitter with full fetches and warn-mode fallback.
    #[must_use]
    pub const fn new(config: SplitConfig, sampler: SeededSampler) -> Self {
        Self {
            config,
            fetch: FetchMode::Full,
            fallback: FallbackMode::Warn,
            sampler,
        }
    }

    /// Set the fetch mode.
    #[must_use]
    pub const fn fetch_mode(mut self, fetch: FetchMode) -> Self {
        self.fetch = fetch;
        self
    }

    /// Set the fallback mode.
    #[must_use]
    pub const fn fallback_mode(mut self, fallback: FallbackMode) -> Self {
        self.fallback = fallback;
        self
    }

    /// Fetch `table` from `source` and split it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for an invalid split config, and
    /// `Error::Data` for an unknown table, too few rows, or a failed policy
    /// in [`FallbackMode::Error`].
    pub async fn split<S: RowSource>(
        &self,
        source: &S,
        table: &TableRef,
        policy: &dyn SplitPolicy,
    ) -> Result<DataSplit> {
        self.config.validate()?;

        let rows = match (self.fetch, self.config.requested_count()) {
            (FetchMode::Sample { offset_fraction }, Some(count)) => {
                source.fetch_sample(table, count, offset_fraction).await?
            }
            _ => source.fetch_all(table).await?,
        };
        info!(table = table.name(), rows = rows.len(), "fetched rows");

        self.split_rows(&rows, policy)
    }

    /// Split rows that are already in memory.
    ///
    /// # Errors
    ///
    /// Same as [`split`](Self::split), without the fetch.
    pub fn split_rows(&self, rows: &[Row], policy: &dyn SplitPolicy) -> Result<DataSplit> {
        self.config.validate()?;
        if rows.is_empty() {
            return Err(Error::Data("no rows available to split".to_string()));
        }
        let sizes = self.config.sizes(rows.len())?;

        let (segments, strategy, fallback_reason) = match policy.split(rows, sizes, &self.sampler) {
            Ok(segments) => (segments, policy.name(), None),
            Err(e) if policy.name() == RandomSplit.name() => return Err(e),
            Err(e) => match self.fallback {
                FallbackMode::Warn => {
                    warn!(
                        strategy = policy.name(),
                        error = %e,
                        "split strategy failed, falling back to random"
                    );
                    let segments = RandomSplit.split(rows, sizes, &self.sampler)?;
                    (segments, RandomSplit.name(), Some(format!("{}: {e}", policy.name())))
                }
                FallbackMode::Error => {
                    return Err(Error::Data(format!(
                        "split strategy '{}' failed: {e}",
                        policy.name()
                    )))
                }
            },
        };

        info!(
            strategy,
            training = segments.training.len(),
            validation = segments.validation.len(),
            testing = segments.testing.len(),
            "split rows"
        );

        Ok(DataSplit {
            training: segments.training,
            validation: segments.validation,
            testing: segments.testing,
            strategy: strategy.to_string(),
            fallback_reason,
        })
    }
}
