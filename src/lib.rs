//! # combo-eval: Field-Combination Retrieval Evaluation
//!
//! **Version**: 0.1.0
//!
//! combo-eval answers one question: which combination of a table's fields,
//! embedded together, best retrieves the expected answer for a query? Each
//! candidate combination gets its own knowledge base of embedded training
//! rows; held-out queries are matched against it by cosine similarity and
//! the retrieved answers are scored by a pluggable metric.
//!
//! ## Pipeline
//!
//! ```text
//! RowSource ─> DataSplitter ─> ColumnCombination × N
//!                                  │
//!                                  ├─> EmbeddingIndexBuilder ─> KnowledgeBase
//!                                  ├─> CrossValidator (optional)
//!                                  └─> NearestNeighborMatcher ─> Metric ─> CombinationResult
//!                                                                              │
//!                                        ExperimentReport <─ SummaryAggregator ┘
//! ```
//!
//! ## Design Principles
//!
//! - **Reproducible**: seeded splitting, deterministic enumeration, stable ties
//! - **Partial-failure tolerant**: bad rows and combinations are skipped and logged
//! - **Injected I/O**: data and embeddings come only through [`source::RowSource`]
//!   and [`embedding::EmbeddingProvider`]
//! - **Bounded state**: the knowledge-base cache has an explicit capacity
//!
//! ## Example Usage
//!
//! ```rust
//! use combo_eval::cancel::CancelSignal;
//! use combo_eval::config::ExperimentConfig;
//! use combo_eval::embedding::HashEmbeddingProvider;
//! use combo_eval::orchestrator::ExperimentOrchestrator;
//! use combo_eval::row::Row;
//! use combo_eval::source::MemoryRowSource;
//!
//! # #[tokio::main]
//! # async fn main() -> combo_eval::Result<()> {
//! let source = MemoryRowSource::new();
//! source.insert_table(
//!     "faq",
//!     (0..20)
//!         .map(|i| {
//!             Row::new()
//!                 .with("question", format!("question {i}"))
//!                 .with("title", format!("topic {i}"))
//!                 .with("answer", format!("answer {i}"))
//!         })
//!         .collect(),
//! );
//!
//! let mut config = ExperimentConfig::new("faq", ["question", "title"]);
//! config.metric = "similarity".to_string();
//!
//! let mut orchestrator =
//!     ExperimentOrchestrator::new(config, source, HashEmbeddingProvider::new(64));
//! let report = orchestrator.run(&CancelSignal::never()).await?;
//! assert_eq!(report.results.len(), 3);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod cache;
pub mod cancel;
pub mod combination;
pub mod config;
pub mod cross_validation;
pub mod embedding;
pub mod error;
pub mod evaluation;
pub mod experiment;
pub mod index;
pub mod matcher;
pub mod metric;
pub mod orchestrator;
pub mod row;
pub mod sampler;
pub mod source;
pub mod split;
pub mod stats;
pub mod telemetry;

pub use error::{Error, Result};
