//! Property-based tests for splitting, enumeration, matching and scoring
//!
//! Each property runs 100 generated cases.

use combo_eval::combination::{enumerate_combinations, ColumnCombination};
use combo_eval::cross_validation::fold_ranges;
use combo_eval::index::{EmbeddingRecord, KnowledgeBase};
use combo_eval::matcher::{cosine_similarity, NearestNeighborMatcher};
use combo_eval::metric::{Metric, RegulatoryMetric, StructuredQueryMetric};
use combo_eval::row::Row;
use combo_eval::sampler::SeededSampler;
use combo_eval::split::{DataSplitter, RandomSplit, SplitConfig};
use combo_eval::stats;
use proptest::prelude::*;
use serde_json::Map;
use std::collections::BTreeSet;

fn rows(n: usize) -> Vec<Row> {
    (0..n)
        .map(|i| {
            Row::new()
                .with("id", i as u64)
                .with("question", format!("question {i}"))
                .with("answer", format!("answer {i}"))
        })
        .collect()
}

fn ids(rows: &[Row]) -> Vec<u64> {
    rows.iter()
        .filter_map(|r| r.get("id").and_then(serde_json::Value::as_u64))
        .collect()
}

fn arb_ratios() -> impl Strategy<Value = SplitConfig> {
    (1u32..=8, 0u32..=3).prop_map(|(train, validation)| {
        let train = f64::from(train) / 10.0;
        let validation = (f64::from(validation) / 10.0).min(0.9 - train).max(0.0);
        SplitConfig::Ratios {
            train,
            validation,
            test: 1.0 - train - validation,
            max_samples_per_segment: None,
        }
    })
}

fn arb_vector() -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(-10.0f32..10.0, 1..32)
}

fn kb(vectors: Vec<Vec<f32>>) -> KnowledgeBase {
    let records: Vec<EmbeddingRecord> = vectors
        .into_iter()
        .enumerate()
        .map(|(i, vector)| EmbeddingRecord {
            id: i.to_string(),
            combination: "c".to_string(),
            vector,
            text: String::new(),
            target: format!("answer {i}"),
            metadata: Map::new(),
        })
        .collect();
    let n = records.len();
    KnowledgeBase::new(ColumnCombination::new(["c"]), records, n)
}

fn arb_ident() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["users", "orders", "items", "id", "name", "total", "status"])
        .prop_map(str::to_string)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: the same seed yields the same split
    #[test]
    fn prop_random_split_is_deterministic(
        n in 3usize..200,
        seed in any::<u64>(),
        config in arb_ratios(),
    ) {
        let data = rows(n);
        let a = DataSplitter::new(config, SeededSampler::new(seed))
            .split_rows(&data, &RandomSplit)
            .unwrap();
        let b = DataSplitter::new(config, SeededSampler::new(seed))
            .split_rows(&data, &RandomSplit)
            .unwrap();
        prop_assert_eq!(a, b);
    }

    /// Property: random segments are pairwise disjoint and never exceed the input
    #[test]
    fn prop_random_split_is_disjoint(
        n in 3usize..200,
        seed in any::<u64>(),
        config in arb_ratios(),
    ) {
        let data = rows(n);
        let split = DataSplitter::new(config, SeededSampler::new(seed))
            .split_rows(&data, &RandomSplit)
            .unwrap();

        let mut seen = BTreeSet::new();
        let all_ids = ids(&split.training)
            .into_iter()
            .chain(ids(&split.validation))
            .chain(ids(&split.testing));
        for id in all_ids {
            prop_assert!(seen.insert(id), "row {} appears twice", id);
        }
        prop_assert!(seen.len() <= n);
        prop_assert!(!split.testing.is_empty());
    }

    /// Property: enumeration yields min(cap, 2^min(n,5) - 1) unique combinations
    #[test]
    fn prop_enumeration_count(n in 0usize..8, cap in 0usize..40) {
        let fields: Vec<String> = (0..n).map(|i| format!("f{i}")).collect();
        let combos = enumerate_combinations(&fields, cap);

        let full = (1usize << n.min(5)) - 1;
        prop_assert_eq!(combos.len(), full.min(cap));

        let names: BTreeSet<&str> = combos.iter().map(ColumnCombination::name).collect();
        prop_assert_eq!(names.len(), combos.len());
        for pair in combos.windows(2) {
            prop_assert!(pair[0].len() <= pair[1].len());
        }
    }

    /// Property: cosine similarity of a non-zero vector with itself is 1
    #[test]
    fn prop_cosine_self_is_one(v in arb_vector()) {
        prop_assume!(v.iter().any(|x| x.abs() > 1e-3));
        prop_assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-4);
    }

    /// Property: cosine similarity is bounded and zero against a zero vector
    #[test]
    fn prop_cosine_bounded(a in arb_vector(), b in arb_vector()) {
        let zeros = vec![0.0f32; a.len()];
        prop_assert_eq!(cosine_similarity(&a, &zeros), 0.0);

        let s = cosine_similarity(&a, &b);
        prop_assert!((-1.0 - 1e-6..=1.0 + 1e-6).contains(&s));
    }

    /// Property: top-k returns min(k, n) matches in descending similarity
    #[test]
    fn prop_top_k_sorted(
        vectors in prop::collection::vec(prop::collection::vec(-1.0f32..1.0, 4), 1..40),
        query in prop::collection::vec(-1.0f32..1.0, 4),
        k in 1usize..10,
    ) {
        let n = vectors.len();
        let kb = kb(vectors);
        let matches = NearestNeighborMatcher::new().top_k(&query, &kb, k).unwrap();

        prop_assert_eq!(matches.len(), k.min(n));
        for pair in matches.windows(2) {
            prop_assert!(pair[0].similarity >= pair[1].similarity);
        }
    }

    /// Property: the structured-query score is the mean of its five checks
    #[test]
    fn prop_structured_score_is_mean_of_checks(
        col in arb_ident(),
        table in arb_ident(),
        other_col in arb_ident(),
        other_table in arb_ident(),
    ) {
        let expected = format!("SELECT {col} FROM {table}");
        let actual = format!("SELECT {other_col} FROM {other_table} WHERE {col} = 1");
        let score = StructuredQueryMetric::new().calculate(&expected, &actual, 0.0);

        let checks: f64 = [
            "entity_exists",
            "fields_match",
            "keyword_overlap_ok",
            "parseable",
            "balanced_syntax",
        ]
        .iter()
        .map(|key| score.breakdown[*key])
        .sum();
        prop_assert!((score.overall_score - checks / 5.0).abs() < 1e-9);
        prop_assert!((0.0..=1.0).contains(&score.overall_score));
    }

    /// Property: regulatory scores stay in [0, 1] for any text and similarity
    #[test]
    fn prop_regulatory_score_bounded(
        expected in ".{0,80}",
        actual in ".{0,80}",
        sim in -1.0f32..=1.0,
    ) {
        let score = RegulatoryMetric::new().calculate(&expected, &actual, sim);
        prop_assert!((0.0..=1.0).contains(&score.overall_score));
    }

    /// Property: fold ranges tile 0..n with sizes differing by at most one
    #[test]
    fn prop_fold_ranges_tile(n in 0usize..500, k in 2usize..12) {
        let ranges = fold_ranges(n, k);
        prop_assert_eq!(ranges.len(), k);

        let mut next = 0;
        for range in &ranges {
            prop_assert_eq!(range.start, next);
            next = range.end;
        }
        prop_assert_eq!(next, n);

        let sizes: Vec<usize> = ranges.iter().map(|r| r.len()).collect();
        let (min, max) = (sizes.iter().min().unwrap(), sizes.iter().max().unwrap());
        prop_assert!(max - min <= 1);
    }

    /// Property: quartiles are ordered
    #[test]
    fn prop_quartiles_ordered(samples in prop::collection::vec(0.0f64..1.0, 1..50)) {
        let q1 = stats::percentile(&samples, 25.0).unwrap();
        let median = stats::percentile(&samples, 50.0).unwrap();
        let q3 = stats::percentile(&samples, 75.0).unwrap();
        prop_assert!(q1 <= median && median <= q3);
    }
}
