//! Run-scoped caches
//!
//! The orchestrator owns a [`BoundedCache`] of knowledge bases and passes it
//! to the index builder. Capacity is explicit, so reusing one orchestrator
//! across many experiments cannot grow memory without bound.
//!
//! # Example
//!
//! ```rust
//! use combo_eval::cache::BoundedCache;
//!
//! let mut cache = BoundedCache::new(2);
//! cache.insert("a", 1);
//! cache.insert("b", 2);
//! assert_eq!(cache.get(&"a"), Some(&1));
//!
//! // "b" is now least recently used and is evicted
//! cache.insert("c", 3);
//! assert!(!cache.contains(&"b"));
//! ```

mod lru;

pub use lru::BoundedCache;

use serde::{Deserialize, Serialize};

/// Hit/miss counters for a cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups that found an entry
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Entries dropped to stay within capacity
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of lookups that hit, 0 when nothing was looked up.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
