//! Summary aggregation over combination results

use combo_eval::combination::ColumnCombination;
use combo_eval::evaluation::QueryEvalResult;
use combo_eval::experiment::{CombinationResult, SummaryAggregator};
use std::collections::BTreeMap;

fn query(score: f64, similarity: f32) -> QueryEvalResult {
    QueryEvalResult {
        query: "when is the filing deadline".to_string(),
        expected: "March 31".to_string(),
        retrieved: "March 31".to_string(),
        candidates: vec!["March 31".to_string()],
        similarity,
        score,
        breakdown: BTreeMap::new(),
    }
}

fn result(fields: &[&str], scores: &[f64]) -> CombinationResult {
    let queries = scores.iter().map(|&s| query(s, 0.5)).collect();
    CombinationResult::builder(ColumnCombination::new(fields.iter().copied()), queries)
        .build()
        .unwrap()
}

#[test]
fn test_single_combination_summary() {
    let summary = SummaryAggregator::aggregate(&[result(&["title"], &[0.9, 0.7])]).unwrap();

    assert_eq!(summary.best_combination, "title");
    assert_eq!(summary.worst_combination, "title");
    assert_eq!(summary.best_score, summary.worst_score);
    assert_eq!(summary.median_score, summary.q1_score);
    assert_eq!(summary.median_score, summary.q3_score);
    assert!((summary.mean_score - 0.8).abs() < 1e-9);
    // similarity 0.5 maps to relevance 0.75
    assert!((summary.mean_confidence.unwrap() - 0.75).abs() < 1e-9);
}

#[test]
fn test_tie_goes_to_first_result() {
    let results = [
        result(&["title"], &[0.6]),
        result(&["content"], &[0.6]),
        result(&["title", "content"], &[0.6]),
    ];
    let summary = SummaryAggregator::aggregate(&results).unwrap();
    assert_eq!(summary.best_combination, "title");
    assert_eq!(summary.worst_combination, "title");
    assert_eq!(summary.evaluated_combinations, 3);
}

#[test]
fn test_result_without_queries_is_rejected() {
    let built = CombinationResult::builder(ColumnCombination::new(["title"]), Vec::new()).build();
    assert!(built.is_err());
}

#[test]
fn test_result_statistics() {
    let result = CombinationResult::builder(
        ColumnCombination::new(["title"]),
        vec![query(0.2, 0.0), query(0.4, 0.0), query(0.6, 0.0)],
    )
    .cv_scores(vec![0.3, 0.5])
    .build()
    .unwrap();

    assert!((result.mean_score() - 0.4).abs() < 1e-9);
    assert_eq!(result.test_count(), 3);
    assert!((result.cv_mean().unwrap() - 0.4).abs() < 1e-9);
    let interval = result.confidence_interval().unwrap();
    assert!(interval.lower <= 0.4 && 0.4 <= interval.upper);
}
