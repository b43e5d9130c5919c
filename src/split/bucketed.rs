//! Bucket-proportional sampling: length strata and complexity tertiles.

use super::{SegmentSizes, Segments, SplitPolicy};
use crate::row::Row;
use crate::sampler::SeededSampler;
use crate::{Error, Result};
use tracing::debug;

/// Share of each segment drawn from the low/medium/high bucket.
pub const BUCKET_PROPORTIONS: [f64; 3] = [0.3, 0.4, 0.3];

/// Texts shorter than this are short.
pub const SHORT_MAX_CHARS: usize = 100;
/// Texts shorter than this (and not short) are medium.
pub const MEDIUM_MAX_CHARS: usize = 500;

/// Tokens counted by [`complexity_score`].
pub const STRUCTURAL_KEYWORDS: &[&str] = &[
    "select", "from", "where", "join", "group", "order", "having", "union", "case", "when",
    "and", "or", "not", "in", "exists", "between", "like", "distinct", "limit", "with",
];

/// `2 × structural keyword count + chars / 50`.
///
/// ```
/// use combo_eval::split::complexity_score;
///
/// assert!(complexity_score("SELECT a FROM t WHERE b") > complexity_score("list a"));
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn complexity_score(text: &str) -> f64 {
    let keywords = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .filter(|t| STRUCTURAL_KEYWORDS.contains(&t.to_lowercase().as_str()))
        .count();
    2.0f64.mul_add(keywords as f64, text.chars().count() as f64 / 50.0)
}

fn require_field(policy: &str, field: &str, rows: &[Row]) -> Result<()> {
    if rows.iter().any(|row| row.contains(field)) {
        Ok(())
    } else {
        Err(Error::Data(format!(
            "{policy} split field '{field}' is not present in any row"
        )))
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn quotas(target: usize, capacities: [usize; 3]) -> [usize; 3] {
    let mut quotas = [0usize; 3];
    for (i, share) in BUCKET_PROPORTIONS.iter().enumerate() {
        quotas[i] = ((target as f64 * share).floor() as usize).min(capacities[i]);
    }

    // remainder goes to medium first, then low, then high
    let mut remaining = target.saturating_sub(quotas.iter().sum());
    for i in [1, 0, 2] {
        let extra = (capacities[i] - quotas[i]).min(remaining);
        quotas[i] += extra;
        remaining -= extra;
    }
    quotas
}

fn draw_segment(
    buckets: &[Vec<Row>; 3],
    target: usize,
    segment: u64,
    sampler: &SeededSampler,
) -> Vec<Row> {
    let capacities = [buckets[0].len(), buckets[1].len(), buckets[2].len()];
    let quotas = quotas(target, capacities);

    let mut drawn = Vec::with_capacity(target);
    for (i, (bucket, quota)) in buckets.iter().zip(quotas).enumerate() {
        drawn.extend(sampler.sample(bucket, quota, 1 + segment * 3 + i as u64));
    }
    sampler.shuffle_salted(&drawn, 100 + segment)
}

fn draw_segments(
    buckets: &[Vec<Row>; 3],
    sizes: SegmentSizes,
    sampler: &SeededSampler,
) -> Segments {
    Segments {
        training: draw_segment(buckets, sizes.training, 0, sampler),
        validation: draw_segment(buckets, sizes.validation, 1, sampler),
        testing: draw_segment(buckets, sizes.testing, 2, sampler),
    }
}

/// Length-stratified sampling on a text field.
#[derive(Debug, Clone)]
pub struct StratifiedSplit {
    field: String,
}

impl StratifiedSplit {
    /// Stratify on `field`.
    #[must_use]
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    fn bucket_of(&self, row: &Row) -> usize {
        let len = row.text(&self.field).map_or(0, |t| t.chars().count());
        if len < SHORT_MAX_CHARS {
            0
        } else if len < MEDIUM_MAX_CHARS {
            1
        } else {
            2
        }
    }
}

impl SplitPolicy for StratifiedSplit {
    fn name(&self) -> &'static str {
        "stratified"
    }

    fn split(
        &self,
        rows: &[Row],
        sizes: SegmentSizes,
        sampler: &SeededSampler,
    ) -> Result<Segments> {
        require_field(self.name(), &self.field, rows)?;

        let mut buckets: [Vec<Row>; 3] = Default::default();
        for row in rows {
            buckets[self.bucket_of(row)].push(row.clone());
        }
        debug!(
            field = %self.field,
            short = buckets[0].len(),
            medium = buckets[1].len(),
            long = buckets[2].len(),
            "length buckets"
        );

        Ok(draw_segments(&buckets, sizes, sampler))
    }
}

/// Complexity-tertile sampling on a text field.
#[derive(Debug, Clone)]
pub struct QueryComplexitySplit {
    field: String,
}

impl QueryComplexitySplit {
    /// Score `field`.
    #[must_use]
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl SplitPolicy for QueryComplexitySplit {
    fn name(&self) -> &'static str {
        "query_complexity"
    }

    fn split(
        &self,
        rows: &[Row],
        sizes: SegmentSizes,
        sampler: &SeededSampler,
    ) -> Result<Segments> {
        require_field(self.name(), &self.field, rows)?;

        let mut scored: Vec<(f64, &Row)> = rows
            .iter()
            .map(|row| {
                let text = row.text(&self.field).unwrap_or_default();
                (complexity_score(&text), row)
            })
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = scored.len();
        let (low_end, medium_end) = (n / 3, 2 * n / 3);
        let mut buckets: [Vec<Row>; 3] = Default::default();
        for (rank, (_, row)) in scored.into_iter().enumerate() {
            let bucket = if rank < low_end {
                0
            } else if rank < medium_end {
                1
            } else {
                2
            };
            buckets[bucket].push(row.clone());
        }
        debug!(
            field = %self.field,
            low = buckets[0].len(),
            medium = buckets[1].len(),
            high = buckets[2].len(),
            "complexity tertiles"
        );

        Ok(draw_segments(&buckets, sizes, sampler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_rows() -> Vec<Row> {
        let mut rows = Vec::new();
        for i in 0..30 {
            rows.push(Row::new().with("id", i).with("body", "s".repeat(10)));
        }
        for i in 30..60 {
            rows.push(Row::new().with("id", i).with("body", "m".repeat(200)));
        }
        for i in 60..90 {
            rows.push(Row::new().with("id", i).with("body", "l".repeat(800)));
        }
        rows
    }

    fn count_len(rows: &[Row], len: usize) -> usize {
        rows.iter()
            .filter(|r| r.text("body").is_some_and(|t| t.len() == len))
            .count()
    }

    #[test]
    fn test_quotas_proportional_and_capped() {
        assert_eq!(quotas(10, [100, 100, 100]), [3, 4, 3]);
        assert_eq!(quotas(11, [100, 100, 100]), [3, 5, 3]);
        assert_eq!(quotas(10, [1, 100, 100]), [1, 6, 3]);
        assert_eq!(quotas(10, [1, 1, 1]), [1, 1, 1]);
    }

    #[test]
    fn test_stratified_proportions() {
        let sizes = SegmentSizes {
            training: 20,
            validation: 10,
            testing: 10,
        };
        let segments = StratifiedSplit::new("body")
            .split(&text_rows(), sizes, &SeededSampler::new(5))
            .unwrap();

        assert_eq!(segments.training.len(), 20);
        assert_eq!(count_len(&segments.training, 10), 6);
        assert_eq!(count_len(&segments.training, 200), 8);
        assert_eq!(count_len(&segments.training, 800), 6);
        assert_eq!(segments.testing.len(), 10);
    }

    #[test]
    fn test_stratified_missing_field() {
        let sizes = SegmentSizes {
            training: 1,
            validation: 0,
            testing: 1,
        };
        let err = StratifiedSplit::new("nope")
            .split(&text_rows(), sizes, &SeededSampler::default())
            .unwrap_err();
        assert!(matches!(err, Error::Data(_)));
    }

    #[test]
    fn test_complexity_score() {
        let plain = complexity_score("show me the list");
        let complex = complexity_score("SELECT a FROM t WHERE b IN (SELECT c FROM u) ORDER BY a");
        assert!(complex > plain);
        assert!((complexity_score("where") - (2.0 + 5.0 / 50.0)).abs() < 1e-9);
    }

    #[test]
    fn test_complexity_tertiles() {
        let rows: Vec<Row> = (0..30)
            .map(|i| {
                let q = "select from ".repeat(i % 3) + "x";
                Row::new().with("id", i).with("q", q)
            })
            .collect();
        let sizes = SegmentSizes {
            training: 10,
            validation: 5,
            testing: 5,
        };
        let segments = QueryComplexitySplit::new("q")
            .split(&rows, sizes, &SeededSampler::new(2))
            .unwrap();
        assert_eq!(segments.training.len(), 10);
        let simple = segments
            .training
            .iter()
            .filter(|r| r.text("q").as_deref() == Some("x"))
            .count();
        assert_eq!(simple, 3);
    }
}
