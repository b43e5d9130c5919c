//! Regulatory-domain answer metric.
//!
//! `overall = 0.3·keyword_jaccard + 0.3·concept_jaccard + 0.4·contextual_relevance`
//!
//! Keyword and concept sets are the fixed vocabulary terms found (as
//! case-insensitive substrings) in each text. Two texts that both mention no
//! term at all agree perfectly, so the Jaccard of two empty sets is 1.

use super::{contextual_relevance, Metric, MetricScore};
use std::collections::{BTreeMap, BTreeSet};

/// Regulatory keyword vocabulary.
pub const REGULATORY_KEYWORDS: &[&str] = &[
    "shall",
    "must",
    "required",
    "prohibited",
    "compliance",
    "regulation",
    "permit",
    "license",
    "penalty",
    "violation",
    "exemption",
    "deadline",
    "filing",
    "disclosure",
    "audit",
    "inspection",
    "notice",
    "jurisdiction",
    "statute",
    "ordinance",
];

/// Regulatory concept vocabulary (multi-word terms).
pub const REGULATORY_CONCEPTS: &[&str] = &[
    "data protection",
    "consumer rights",
    "due diligence",
    "risk assessment",
    "reporting obligation",
    "record keeping",
    "security deposit",
    "written notice",
    "right to cure",
    "late fee",
    "civil penalty",
    "safe harbor",
    "informed consent",
    "conflict of interest",
    "statute of limitations",
];

const KEYWORD_WEIGHT: f64 = 0.3;
const CONCEPT_WEIGHT: f64 = 0.3;
const CONTEXT_WEIGHT: f64 = 0.4;

/// Weighted vocabulary-overlap plus similarity metric.
#[derive(Debug, Clone)]
pub struct RegulatoryMetric {
    keywords: Vec<String>,
    concepts: Vec<String>,
}

impl Default for RegulatoryMetric {
    fn default() -> Self {
        Self::new()
    }
}

impl RegulatoryMetric {
    /// Metric over the built-in vocabularies.
    #[must_use]
    pub fn new() -> Self {
        Self::with_vocabulary(REGULATORY_KEYWORDS, REGULATORY_CONCEPTS)
    }

    /// Metric over custom vocabularies.
    #[must_use]
    pub fn with_vocabulary<S: AsRef<str>>(keywords: &[S], concepts: &[S]) -> Self {
        let lower = |terms: &[S]| -> Vec<String> {
            terms.iter().map(|t| t.as_ref().to_lowercase()).collect()
        };
        Self {
            keywords: lower(keywords),
            concepts: lower(concepts),
        }
    }

    fn terms_in<'a>(vocabulary: &'a [String], text: &str) -> BTreeSet<&'a str> {
        vocabulary
            .iter()
            .filter(|term| text.contains(term.as_str()))
            .map(String::as_str)
            .collect()
    }
}

/// Jaccard index `|a ∩ b| / |a ∪ b|`; 1 for two empty sets.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 1.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

impl Metric for RegulatoryMetric {
    fn key(&self) -> &'static str {
        "regulatory"
    }

    fn calculate(&self, expected: &str, actual: &str, similarity: f32) -> MetricScore {
        let expected = expected.to_lowercase();
        let actual = actual.to_lowercase();

        let keyword_jaccard = jaccard(
            &Self::terms_in(&self.keywords, &expected),
            &Self::terms_in(&self.keywords, &actual),
        );
        let concept_jaccard = jaccard(
            &Self::terms_in(&self.concepts, &expected),
            &Self::terms_in(&self.concepts, &actual),
        );
        let relevance = contextual_relevance(similarity);

        let overall = CONTEXT_WEIGHT.mul_add(
            relevance,
            KEYWORD_WEIGHT.mul_add(keyword_jaccard, CONCEPT_WEIGHT * concept_jaccard),
        );

        let mut breakdown = BTreeMap::new();
        breakdown.insert("keyword_jaccard".to_string(), keyword_jaccard);
        breakdown.insert("concept_jaccard".to_string(), concept_jaccard);
        breakdown.insert("contextual_relevance".to_string(), relevance);
        MetricScore::new(overall, breakdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_text_full_similarity_scores_one() {
        let metric = RegulatoryMetric::new();
        let text = "The landlord must return the security deposit after written notice.";
        let score = metric.calculate(text, text, 1.0);
        assert!((score.overall_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_vocabulary_terms_scores_on_similarity() {
        let metric = RegulatoryMetric::new();
        let score = metric.calculate("blue sky", "green grass", 0.0);
        // 0.3 + 0.3 + 0.4 * 0.5
        assert!((score.overall_score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_partial_keyword_overlap() {
        let metric = RegulatoryMetric::new();
        let score = metric.calculate("a permit is required", "permit fees", -1.0);
        // keywords: {permit, required} vs {permit} → 1/2; concepts empty → 1; relevance 0
        assert!((score.breakdown["keyword_jaccard"] - 0.5).abs() < 1e-9);
        assert!((score.overall_score - (0.15 + 0.3)).abs() < 1e-9);
    }

    #[test]
    fn test_case_insensitive_substring_match() {
        let metric = RegulatoryMetric::new();
        let score = metric.calculate("DUE DILIGENCE", "Due Diligence review", 1.0);
        assert!((score.breakdown["concept_jaccard"] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_jaccard() {
        let a: BTreeSet<_> = [1, 2, 3].into_iter().collect();
        let b: BTreeSet<_> = [2, 3, 4].into_iter().collect();
        assert!((jaccard(&a, &b) - 0.5).abs() < 1e-9);
        assert!((jaccard::<i32>(&BTreeSet::new(), &BTreeSet::new()) - 1.0).abs() < 1e-9);
    }
}
