//! Embedding providers
//!
//! The engine never talks to an embedding vendor directly. It calls an
//! injected [`EmbeddingProvider`], optionally wrapped in a
//! [`RateLimitedProvider`] that paces calls with a `governor` rate limiter.
//!
//! # Example
//!
//! ```rust
//! use combo_eval::embedding::{EmbeddingProvider, HashEmbeddingProvider};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = HashEmbeddingProvider::new(64);
//! provider.initialize().await?;
//! let vector = provider.embed("late filing penalty").await?;
//! assert_eq!(vector.len(), 64);
//! # Ok(())
//! # }
//! ```

mod rate_limit;

pub use rate_limit::RateLimitedProvider;

use std::future::Future;

/// Embedding vector.
pub type Embedding = Vec<f32>;

/// External embedding capability.
///
/// Vectors returned for one provider configuration must share a dimension
/// for the lifetime of an experiment. Vendor errors are reported as
/// `anyhow::Error`; the engine turns them into row-level failures.
pub trait EmbeddingProvider: Send + Sync {
    /// Prepare the provider (load a model, check credentials, ...).
    fn initialize(&self) -> impl Future<Output = anyhow::Result<()>> + Send {
        async { Ok(()) }
    }

    /// Embed one text.
    fn embed(&self, text: &str) -> impl Future<Output = anyhow::Result<Embedding>> + Send;
}

impl<P: EmbeddingProvider> EmbeddingProvider for &P {
    fn initialize(&self) -> impl Future<Output = anyhow::Result<()>> + Send {
        (**self).initialize()
    }

    fn embed(&self, text: &str) -> impl Future<Output = anyhow::Result<Embedding>> + Send {
        (**self).embed(text)
    }
}

/// Deterministic bag-of-tokens embedding via FNV hashing.
///
/// Tokens are lowercased ASCII alphanumeric runs hashed into `dim` buckets;
/// the result is L2-normalized. No model, no network: two texts with the
/// same tokens always get the same vector.
#[derive(Debug, Clone)]
pub struct HashEmbeddingProvider {
    dim: usize,
}

impl HashEmbeddingProvider {
    /// Create a provider with the given dimension (minimum 8).
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(8) }
    }

    /// Vector dimension.
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dim
    }

    /// Synchronous embedding used by the async trait method.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn embed_sync(&self, text: &str) -> Embedding {
        let mut v = vec![0.0f32; self.dim];

        for token in text
            .to_ascii_lowercase()
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut h: u64 = 0xcbf2_9ce4_8422_2325;
            for b in token.as_bytes() {
                h ^= u64::from(*b);
                h = h.wrapping_mul(0x0100_0000_01b3);
            }
            v[(h % self.dim as u64) as usize] += 1.0;
        }

        normalize(&mut v);
        v
    }
}

impl Default for HashEmbeddingProvider {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(&self, text: &str) -> anyhow::Result<Embedding> {
        Ok(self.embed_sync(text))
    }
}

/// L2-normalize in place. Zero vectors are left untouched.
pub fn normalize(embedding: &mut [f32]) {
    let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in embedding.iter_mut() {
            *x /= norm;
        }
    }
}
