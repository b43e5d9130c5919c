//! Splitting through a row source: strategies, fetch modes and fallback

use combo_eval::row::{Row, RowSchema};
use combo_eval::sampler::SeededSampler;
use combo_eval::source::{MemoryRowSource, TableRef};
use combo_eval::split::{
    DataSplitter, FallbackMode, FetchMode, RandomSplit, SplitConfig, SplitPolicy, SplitStrategy,
    TimeWindow,
};
use combo_eval::Error;
use std::collections::HashSet;

fn tickets(n: usize) -> Vec<Row> {
    (0..n)
        .map(|i| {
            let question = match i % 3 {
                0 => "reset password".to_string(),
                1 => format!("why was invoice {i} charged twice after the plan change"),
                _ => format!(
                    "SELECT name FROM accounts WHERE id IN \
                     (SELECT account FROM invoices WHERE total > {i}) ORDER BY name"
                ),
            };
            Row::new()
                .with("id", i as u64)
                .with("question", question)
                .with("answer", format!("resolution {i}"))
                .with("created_at", format!("2024-01-{:02}T09:00:00Z", 1 + i % 28))
        })
        .collect()
}

fn source(n: usize) -> MemoryRowSource {
    let source = MemoryRowSource::new();
    source.insert_table("tickets", tickets(n));
    source
}

fn table() -> TableRef {
    TableRef::new("tickets").with_schema(RowSchema::new(["answer"]).with_optional(["question"]))
}

fn ids(rows: &[Row]) -> HashSet<u64> {
    rows.iter()
        .filter_map(|r| r.get("id").and_then(serde_json::Value::as_u64))
        .collect()
}

fn splitter(config: SplitConfig) -> DataSplitter {
    DataSplitter::new(config, SeededSampler::new(7))
}

#[tokio::test]
async fn test_default_ratios_partition_rows() {
    let split = splitter(SplitConfig::default())
        .split(&source(200), &table(), &RandomSplit)
        .await
        .unwrap();

    assert_eq!(split.training.len(), 140);
    assert_eq!(split.validation.len(), 30);
    assert_eq!(split.testing.len(), 30);

    let (train, val, test) = (ids(&split.training), ids(&split.validation), ids(&split.testing));
    assert!(train.is_disjoint(&val));
    assert!(train.is_disjoint(&test));
    assert!(val.is_disjoint(&test));
}

#[tokio::test]
async fn test_fixed_sizes() {
    let config = SplitConfig::Fixed {
        train: 50,
        validation: 10,
        test: 20,
    };
    let split = splitter(config)
        .split(&source(100), &table(), &RandomSplit)
        .await
        .unwrap();
    assert_eq!(
        (split.training.len(), split.validation.len(), split.testing.len()),
        (50, 10, 20)
    );
}

#[tokio::test]
async fn test_fixed_sizes_larger_than_table() {
    let config = SplitConfig::Fixed {
        train: 50,
        validation: 10,
        test: 20,
    };
    let err = splitter(config)
        .split(&source(60), &table(), &RandomSplit)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Data(_)));
}

#[tokio::test]
async fn test_invalid_ratios_rejected() {
    let config = SplitConfig::Ratios {
        train: 0.7,
        validation: 0.2,
        test: 0.2,
        max_samples_per_segment: None,
    };
    let err = splitter(config)
        .split(&source(10), &table(), &RandomSplit)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[tokio::test]
async fn test_sample_fetch_reads_a_window() {
    let config = SplitConfig::Ratios {
        train: 0.5,
        validation: 0.25,
        test: 0.25,
        max_samples_per_segment: Some(10),
    };
    let split = splitter(config)
        .fetch_mode(FetchMode::Sample {
            offset_fraction: 0.5,
        })
        .split(&source(100), &table(), &RandomSplit)
        .await
        .unwrap();

    // 30 rows fetched from the middle of the table
    let all: HashSet<u64> = ids(&split.training)
        .into_iter()
        .chain(ids(&split.validation))
        .chain(ids(&split.testing))
        .collect();
    assert!(all.iter().all(|id| (50..80).contains(id)));
    assert_eq!(split.training.len(), 10);
    assert_eq!(split.validation.len(), 7);
    assert_eq!(split.testing.len(), 8);
}

#[tokio::test]
async fn test_unknown_table() {
    let err = splitter(SplitConfig::default())
        .split(&source(10), &TableRef::new("nope"), &RandomSplit)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Data(ref msg) if msg.contains("nope")));
}

#[tokio::test]
async fn test_same_seed_same_split() {
    let a = splitter(SplitConfig::default())
        .split(&source(90), &table(), &RandomSplit)
        .await
        .unwrap();
    let b = splitter(SplitConfig::default())
        .split(&source(90), &table(), &RandomSplit)
        .await
        .unwrap();
    assert_eq!(a, b);

    let c = DataSplitter::new(SplitConfig::default(), SeededSampler::new(8))
        .split(&source(90), &table(), &RandomSplit)
        .await
        .unwrap();
    assert_ne!(ids(&a.testing), ids(&c.testing));
}

#[tokio::test]
async fn test_named_strategies_produce_requested_sizes() {
    let strategies = [
        SplitStrategy::Stratified {
            field: "question".to_string(),
        },
        SplitStrategy::QueryComplexity {
            field: "question".to_string(),
        },
        SplitStrategy::TimeBased {
            field: "created_at".to_string(),
            window: TimeWindow::Week,
        },
    ];

    for strategy in strategies {
        let policy = strategy.policy();
        let split = splitter(SplitConfig::default())
            .split(&source(120), &table(), policy.as_ref())
            .await
            .unwrap();
        assert_eq!(split.strategy, strategy.name());
        assert!(split.fallback_reason.is_none());
        assert_eq!(split.training.len(), 84, "{}", strategy.name());
        assert_eq!(split.validation.len(), 18, "{}", strategy.name());
        assert_eq!(split.testing.len(), 18, "{}", strategy.name());
    }
}

#[tokio::test]
async fn test_time_based_segments_are_disjoint() {
    let policy = SplitStrategy::TimeBased {
        field: "created_at".to_string(),
        window: TimeWindow::Day,
    }
    .policy();
    let split = splitter(SplitConfig::default())
        .split(&source(100), &table(), policy.as_ref())
        .await
        .unwrap();
    assert!(ids(&split.training).is_disjoint(&ids(&split.testing)));
    assert!(ids(&split.validation).is_disjoint(&ids(&split.testing)));
}

#[tokio::test]
async fn test_unparseable_timestamps_fall_back() {
    let policy = SplitStrategy::TimeBased {
        field: "question".to_string(),
        window: TimeWindow::Day,
    }
    .policy();
    let split = splitter(SplitConfig::default())
        .split(&source(40), &table(), policy.as_ref())
        .await
        .unwrap();
    assert_eq!(split.strategy, RandomSplit.name());
    assert!(split.fallback_reason.unwrap().contains("time_based"));
}

#[tokio::test]
async fn test_fallback_error_mode() {
    let policy = SplitStrategy::Stratified {
        field: "missing".to_string(),
    }
    .policy();
    let err = splitter(SplitConfig::default())
        .fallback_mode(FallbackMode::Error)
        .split(&source(40), &table(), policy.as_ref())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Data(ref msg) if msg.contains("stratified")));
}

#[test]
fn test_strategy_from_name() {
    let strategy =
        SplitStrategy::from_name("Time_Based", Some("created_at"), TimeWindow::Month).unwrap();
    assert_eq!(
        strategy,
        SplitStrategy::TimeBased {
            field: "created_at".to_string(),
            window: TimeWindow::Month,
        }
    );
    assert!(SplitStrategy::from_name("stratified", None, TimeWindow::Day).is_err());
    assert!(SplitStrategy::from_name("alphabetical", None, TimeWindow::Day).is_err());
}

#[test]
fn test_strategy_json_shape() {
    let strategy: SplitStrategy =
        serde_json::from_str(r#"{"name":"query_complexity","field":"question"}"#).unwrap();
    assert_eq!(strategy.field(), Some("question"));

    let config: SplitConfig =
        serde_json::from_str(r#"{"type":"fixed","train":10,"validation":0,"test":5}"#).unwrap();
    assert_eq!(config.requested_count(), Some(15));
}
