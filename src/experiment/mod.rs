//! Experiment records
//!
//! Records produced by an experiment run, all serializable with serde:
//!
//! ```text
//! ExperimentReport (1) ──< CombinationResult (N) ──< QueryEvalResult (N)
//!        │                        ├── PhaseTimings
//!        │                        └── DataQuality
//!        ├──< CombinationFailure (N)
//!        └─── ExperimentSummary (1)   [SummaryAggregator]
//! ```

mod combination_result;
mod report;
mod summary;

pub use combination_result::{
    throughput, CombinationFailure, CombinationResult, CombinationResultBuilder, DataQuality,
    PhaseTimings,
};
pub use report::ExperimentReport;
pub use summary::{ExperimentSummary, SummaryAggregator};
