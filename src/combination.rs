//! Column combination enumeration
//!
//! Candidate fields are truncated positionally to the first
//! [`MAX_COMBINATION_FIELDS`]; later fields are never combined. Subsets are
//! generated size-ascending, then in index-lexicographic order, so capping
//! the list by prefix truncation is stable across runs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of candidate fields considered for combination.
pub const MAX_COMBINATION_FIELDS: usize = 5;

/// Separator used in combination display names.
pub const NAME_SEPARATOR: &str = " + ";

/// An ordered subset of source fields embedded together as one text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnCombination {
    fields: Vec<String>,
    name: String,
}

impl ColumnCombination {
    /// Create a combination from fields in the given order.
    #[must_use]
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        let name = fields.join(NAME_SEPARATOR);
        Self { fields, name }
    }

    /// Fields in combination order.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Display name (fields joined by `" + "`).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the combination has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for ColumnCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Enumerate every non-empty subset of the first five candidates, capped to
/// `max_combinations`.
///
/// # Example
///
/// ```
/// use combo_eval::combination::enumerate_combinations;
///
/// let combos = enumerate_combinations(&["a", "b", "c"], 20);
/// let names: Vec<_> = combos.iter().map(|c| c.name().to_string()).collect();
/// assert_eq!(names, ["a", "b", "c", "a + b", "a + c", "b + c", "a + b + c"]);
/// ```
#[must_use]
pub fn enumerate_combinations<S: AsRef<str>>(
    candidates: &[S],
    max_combinations: usize,
) -> Vec<ColumnCombination> {
    let pool: Vec<&str> = candidates
        .iter()
        .take(MAX_COMBINATION_FIELDS)
        .map(AsRef::as_ref)
        .collect();

    let mut combinations = Vec::new();
    for size in 1..=pool.len() {
        let mut indices: Vec<usize> = (0..size).collect();
        loop {
            if combinations.len() == max_combinations {
                return combinations;
            }
            combinations.push(ColumnCombination::new(indices.iter().map(|&i| pool[i])));
            if !next_indices(&mut indices, pool.len()) {
                break;
            }
        }
    }
    combinations
}

/// Advance `indices` to the next k-subset of `0..n` in lexicographic order.
fn next_indices(indices: &mut [usize], n: usize) -> bool {
    let k = indices.len();
    let Some(pos) = (0..k).rev().find(|&i| indices[i] < n - k + i) else {
        return false;
    };
    indices[pos] += 1;
    for i in pos + 1..k {
        indices[i] = indices[i - 1] + 1;
    }
    true
}
