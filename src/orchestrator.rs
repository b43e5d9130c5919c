//! Experiment orchestration
//!
//! One [`ExperimentOrchestrator`] drives a whole run:
//!
//! ```text
//! validate config ─> initialize provider ─> fetch + split ─> check fields
//!        │
//!        └─> for each combination:
//!              build KB (cached) ─> [cross-validate] ─> [validation] ─> testing
//!              ok: CombinationResult        err: CombinationFailure (logged)
//!        │
//!        └─> SummaryAggregator ─> ExperimentReport
//! ```
//!
//! The split policy comes from the config's strategy unless one is injected
//! with [`ExperimentOrchestrator::with_split_policy`]. Cross-validation runs
//! only when the config enables it.

use crate::cancel::CancelSignal;
use crate::combination::{enumerate_combinations, ColumnCombination};
use crate::config::ExperimentConfig;
use crate::cross_validation::CrossValidator;
use crate::embedding::EmbeddingProvider;
use crate::evaluation::{mean_score, RowEvaluator};
use crate::experiment::{
    CombinationFailure, CombinationResult, DataQuality, ExperimentReport, PhaseTimings,
    SummaryAggregator,
};
use crate::index::{EmbeddingIndexBuilder, KnowledgeBaseCache};
use crate::metric::MetricRegistry;
use crate::row::{Row, RowSchema};
use crate::sampler::SeededSampler;
use crate::split::{DataSplit, DataSplitter, SplitPolicy};
use crate::source::{RowSource, TableRef};
use crate::{Error, Result};
use chrono::Utc;
use std::time::Instant;
use tracing::{info, warn};

/// Per-run inputs shared by every combination.
struct RunPlan<'a> {
    builder: EmbeddingIndexBuilder,
    evaluator: RowEvaluator,
    cross_validator: Option<CrossValidator>,
    training: &'a [Row],
    validation: Vec<Row>,
    testing: Vec<Row>,
    test_rows: usize,
    filtered_test_rows: usize,
}

/// Runs experiments over a row source with an embedding provider.
#[derive(Debug)]
pub struct ExperimentOrchestrator<S, P> {
    config: ExperimentConfig,
    source: S,
    provider: P,
    policy: Box<dyn SplitPolicy>,
    metrics: MetricRegistry,
    cache: KnowledgeBaseCache,
    experiment_id: Option<String>,
}

impl<S: RowSource, P: EmbeddingProvider> ExperimentOrchestrator<S, P> {
    /// Create an orchestrator. The split policy follows `config.strategy`.
    #[must_use]
    pub fn new(config: ExperimentConfig, source: S, provider: P) -> Self {
        let policy = config.strategy.policy();
        let cache = KnowledgeBaseCache::new(config.cache_capacity);
        Self {
            config,
            source,
            provider,
            policy,
            metrics: MetricRegistry::new(),
            cache,
            experiment_id: None,
        }
    }

    /// Use `policy` instead of the configured strategy.
    #[must_use]
    pub fn with_split_policy(mut self, policy: Box<dyn SplitPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Use a preconfigured metric registry (for example with a schema catalog).
    #[must_use]
    pub fn with_metric_registry(mut self, metrics: MetricRegistry) -> Self {
        self.metrics = metrics;
        self
    }

    /// Fix the report's experiment id.
    #[must_use]
    pub fn with_experiment_id(mut self, id: impl Into<String>) -> Self {
        self.experiment_id = Some(id.into());
        self
    }

    /// The config.
    #[must_use]
    pub const fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// The embedding provider.
    #[must_use]
    pub const fn provider(&self) -> &P {
        &self.provider
    }

    /// The knowledge-base cache.
    #[must_use]
    pub const fn cache(&self) -> &KnowledgeBaseCache {
        &self.cache
    }

    /// Run the experiment.
    ///
    /// # Errors
    ///
    /// - `Error::Configuration` for an invalid config (before any data access)
    /// - `Error::Provider` if the provider fails to initialize
    /// - `Error::Data` for an unknown table or field, or too few rows
    /// - `Error::Cancelled` if the signal fires
    /// - `Error::Experiment` if no combination produced results
    pub async fn run(&mut self, cancel: &CancelSignal) -> Result<ExperimentReport> {
        let started_at = Utc::now();

        self.config.validate()?;
        let metric = self.metrics.get(&self.config.metric)?;
        let cross_validator = self
            .config
            .cross_validation
            .as_ref()
            .map(CrossValidator::from_config)
            .transpose()?;
        cancel.check()?;

        self.provider
            .initialize()
            .await
            .map_err(|e| Error::Provider(format!("provider initialization failed: {e}")))?;

        let fields = self.config.effective_fields().to_vec();
        let table = TableRef::new(self.config.table.as_str()).with_schema(
            RowSchema::new([self.config.target_field.as_str()])
                .with_optional(fields.iter().map(String::as_str)),
        );

        let split = DataSplitter::new(self.config.split, SeededSampler::new(self.config.seed))
            .fetch_mode(self.config.fetch)
            .fallback_mode(self.config.fallback)
            .split(&self.source, &table, self.policy.as_ref())
            .await?;

        self.check_fields(&split, &fields)?;

        let combinations = enumerate_combinations(&fields, self.config.max_combinations);
        info!(
            table = %self.config.table,
            combinations = combinations.len(),
            training = split.training.len(),
            testing = split.testing.len(),
            strategy = %split.strategy,
            "starting experiment"
        );

        let filter = self.config.length_filter;
        let query_field = self.config.query_field.clone();
        let target_field = self.config.target_field.clone();
        let (testing, filtered_test_rows) =
            filter.apply(&split.testing, &query_field, &target_field);
        let (validation, _) = filter.apply(&split.validation, &query_field, &target_field);

        let plan = RunPlan {
            builder: EmbeddingIndexBuilder::new(target_field.as_str())
                .text_order(self.config.text_order)
                .batch_size(self.config.batch_size)
                .batch_pause(self.config.batch_pause()),
            evaluator: RowEvaluator::new(query_field, target_field, self.config.top_k, metric),
            cross_validator,
            training: &split.training,
            validation,
            testing,
            test_rows: split.testing.len(),
            filtered_test_rows,
        };

        let mut results = Vec::with_capacity(combinations.len());
        let mut failures = Vec::new();
        for combination in &combinations {
            cancel.check()?;
            match self.evaluate_combination(&plan, combination, cancel).await {
                Ok(result) => {
                    info!(
                        combination = %combination,
                        mean_score = result.mean_score(),
                        test_count = result.test_count(),
                        "combination evaluated"
                    );
                    results.push(result);
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    warn!(combination = %combination, error = %e, "combination failed");
                    failures.push(CombinationFailure {
                        combination: combination.name().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if results.is_empty() {
            return Err(Error::Experiment(format!(
                "all {} combinations failed",
                combinations.len()
            )));
        }

        let mut summary = SummaryAggregator::aggregate(&results)?;
        summary.failed_combinations = failures.len();
        info!(
            best = %summary.best_combination,
            best_score = summary.best_score,
            failed = failures.len(),
            "experiment finished"
        );

        let experiment_id = self.experiment_id.clone().unwrap_or_else(|| {
            format!(
                "exp-{}-{}",
                started_at.format("%Y%m%dT%H%M%S%.3fZ"),
                self.config.seed
            )
        });

        Ok(ExperimentReport {
            experiment_id,
            started_at,
            ended_at: Utc::now(),
            config: self.config.clone(),
            split: split.stats(),
            results,
            failures,
            summary,
        })
    }

    fn check_fields(&self, split: &DataSplit, fields: &[String]) -> Result<()> {
        let rows: Vec<&Row> = split.training.iter().chain(&split.testing).collect();
        let required = fields
            .iter()
            .map(String::as_str)
            .chain([self.config.query_field.as_str()]);
        for field in required {
            if !rows.iter().any(|row| row.contains(field)) {
                return Err(Error::Data(format!(
                    "unknown field '{field}' in table '{}'",
                    self.config.table
                )));
            }
        }
        Ok(())
    }

    async fn evaluate_combination(
        &mut self,
        plan: &RunPlan<'_>,
        combination: &ColumnCombination,
        cancel: &CancelSignal,
    ) -> Result<CombinationResult> {
        let mut timings = PhaseTimings::default();

        let start = Instant::now();
        let kb = plan
            .builder
            .build_cached(
                &self.provider,
                combination,
                plan.training,
                self.config.seed,
                &mut self.cache,
                cancel,
            )
            .await?;
        timings.build_seconds = start.elapsed().as_secs_f64();

        let mut cv_scores = None;
        if let Some(cv) = &plan.cross_validator {
            let start = Instant::now();
            let scores = cv
                .run(
                    &plan.builder,
                    &plan.evaluator,
                    &self.provider,
                    combination,
                    plan.training,
                    cancel,
                )
                .await?;
            timings.cross_validation_seconds = start.elapsed().as_secs_f64();
            cv_scores = Some(scores);
        }

        let mut validation_score = None;
        if self.config.evaluate_validation && !plan.validation.is_empty() {
            let start = Instant::now();
            let results = plan
                .evaluator
                .evaluate(&self.provider, &kb, &plan.validation, cancel)
                .await?;
            timings.validation_seconds = start.elapsed().as_secs_f64();
            validation_score = mean_score(&results);
        }

        if plan.testing.is_empty() {
            return Err(Error::combination(
                combination.name(),
                "no testing rows left after the length filter",
            ));
        }
        let start = Instant::now();
        let test_results = plan
            .evaluator
            .evaluate(&self.provider, &kb, &plan.testing, cancel)
            .await?;
        timings.testing_seconds = start.elapsed().as_secs_f64();

        let data_quality = DataQuality {
            training_rows: plan.training.len(),
            knowledge_base_records: kb.len(),
            skipped_training_rows: kb.skipped_rows(),
            test_rows: plan.test_rows,
            filtered_test_rows: plan.filtered_test_rows,
            evaluated_queries: test_results.len(),
            skipped_queries: plan.testing.len() - test_results.len(),
        };

        let mut builder = CombinationResult::builder(combination.clone(), test_results)
            .validation_score(validation_score)
            .timings(timings)
            .data_quality(data_quality);
        if let Some(scores) = cv_scores {
            builder = builder.cv_scores(scores);
        }
        builder.build()
    }
}
