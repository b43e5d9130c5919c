//! Nearest-neighbor matching over a knowledge base
//!
//! **Problem**: sorting every record by similarity is O(N log N) per query.
//!
//! **Solution**: bounded binary heap over a linear scan, O(N log K). No
//! approximate index: every record is compared.
//!
//! Ordering is by similarity descending; equal similarities keep knowledge
//! base insertion order, so results are stable across runs.

use crate::embedding::EmbeddingProvider;
use crate::index::{EmbeddingRecord, KnowledgeBase};
use crate::{Error, Result};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Cosine similarity `dot(a,b) / (‖a‖·‖b‖)`.
///
/// Returns 0 when either norm is zero or the lengths differ.
///
/// ```
/// use combo_eval::matcher::cosine_similarity;
///
/// assert!((cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < 1e-6);
/// assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
/// ```
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (dot, na, nb) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(d, aa, bb), (x, y)| {
            (d + x * y, aa + x * x, bb + y * y)
        });

    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    let sim = dot / (na.sqrt() * nb.sqrt());
    if sim.is_finite() {
        sim.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// A knowledge-base record with its similarity to the query.
#[derive(Debug, Clone, Copy)]
pub struct Match<'a> {
    /// The matched record
    pub record: &'a EmbeddingRecord,
    /// Position in the knowledge base
    pub index: usize,
    /// Cosine similarity to the query (−1..1)
    pub similarity: f32,
}

// Heap entry ordered so the *worst* kept candidate sits on top: lower
// similarity is "greater", and among equals the later index is "greater".
#[derive(Debug)]
struct Candidate {
    similarity: f32,
    index: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .similarity
            .total_cmp(&self.similarity)
            .then_with(|| self.index.cmp(&other.index))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Linear-scan nearest-neighbor matcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestNeighborMatcher;

impl NearestNeighborMatcher {
    /// Create a matcher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Top-`k` records for an already-embedded query.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `k` is zero.
    pub fn top_k<'a>(
        &self,
        query: &[f32],
        kb: &'a KnowledgeBase,
        k: usize,
    ) -> Result<Vec<Match<'a>>> {
        if k == 0 {
            return Err(Error::InvalidInput("k must be greater than 0".to_string()));
        }

        let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(k + 1);
        for (index, record) in kb.records().iter().enumerate() {
            let candidate = Candidate {
                similarity: cosine_similarity(query, &record.vector),
                index,
            };
            if heap.len() < k {
                heap.push(candidate);
            } else if heap.peek().is_some_and(|worst| candidate < *worst) {
                heap.pop();
                heap.push(candidate);
            }
        }

        // ascending Candidate order is best-first
        let records = kb.records();
        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|c| Match {
                record: &records[c.index],
                index: c.index,
                similarity: c.similarity,
            })
            .collect())
    }

    /// Best match for an already-embedded query, `None` for an empty
    /// knowledge base.
    #[must_use]
    pub fn best<'a>(&self, query: &[f32], kb: &'a KnowledgeBase) -> Option<Match<'a>> {
        self.top_k(query, kb, 1).ok()?.into_iter().next()
    }

    /// Embed `query` with the provider and return the top-`k` records.
    ///
    /// # Errors
    ///
    /// Returns `Error::Row` if embedding fails or the query dimension does
    /// not match the knowledge base, or `Error::InvalidInput` for `k == 0`.
    pub async fn find<'a, P: EmbeddingProvider>(
        &self,
        provider: &P,
        kb: &'a KnowledgeBase,
        query: &str,
        k: usize,
    ) -> Result<Vec<Match<'a>>> {
        let vector = provider
            .embed(query)
            .await
            .map_err(|e| Error::Row(format!("query embedding failed: {e}")))?;
        if !kb.is_empty() && vector.len() != kb.dimension() {
            return Err(Error::Row(format!(
                "query dimension {} does not match knowledge base dimension {}",
                vector.len(),
                kb.dimension()
            )));
        }
        self.top_k(&vector, kb, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combination::ColumnCombination;
    use crate::embedding::HashEmbeddingProvider;
    use serde_json::Map;

    fn kb(vectors: Vec<Vec<f32>>) -> KnowledgeBase {
        let records = vectors
            .into_iter()
            .enumerate()
            .map(|(i, vector)| EmbeddingRecord {
                id: format!("r{i}"),
                combination: "c".to_string(),
                vector,
                text: String::new(),
                target: format!("answer-{i}"),
                metadata: Map::new(),
            })
            .collect::<Vec<_>>();
        let n = records.len();
        KnowledgeBase::new(ColumnCombination::new(["c"]), records, n)
    }

    #[test]
    fn test_cosine_self_is_one() {
        let v = [0.3, -1.2, 4.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_and_mismatch() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_top_k_orders_descending() {
        let kb = kb(vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.7, 0.7]]);
        let matches = NearestNeighborMatcher::new().top_k(&[1.0, 0.1], &kb, 2).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].index, 1);
        assert_eq!(matches[1].index, 2);
        assert!(matches[0].similarity >= matches[1].similarity);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let kb = kb(vec![
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![2.0, 0.0],
            vec![3.0, 0.0],
        ]);
        let matcher = NearestNeighborMatcher::new();
        let matches = matcher.top_k(&[1.0, 0.0], &kb, 2).unwrap();
        let indices: Vec<_> = matches.iter().map(|m| m.index).collect();
        assert_eq!(indices, [1, 2]);

        let all = matcher.top_k(&[1.0, 0.0], &kb, 10).unwrap();
        let indices: Vec<_> = all.iter().map(|m| m.index).collect();
        assert_eq!(indices, [1, 2, 3, 0]);
    }

    #[test]
    fn test_top_k_zero_is_error() {
        let kb = kb(vec![vec![1.0]]);
        assert!(NearestNeighborMatcher::new().top_k(&[1.0], &kb, 0).is_err());
    }

    #[test]
    fn test_best_on_empty_kb() {
        let kb = kb(vec![]);
        assert!(NearestNeighborMatcher::new().best(&[1.0], &kb).is_none());
    }

    #[tokio::test]
    async fn test_find_dimension_mismatch() {
        let kb = kb(vec![vec![1.0, 0.0]]);
        let provider = HashEmbeddingProvider::new(8);
        let err = NearestNeighborMatcher::new()
            .find(&provider, &kb, "query", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Row(_)));
    }
}
