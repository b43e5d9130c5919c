//! Rate limiting behind the provider boundary.
//!
//! [`RateLimitedProvider`] waits on a `governor` direct limiter before every
//! `embed` call. The quota allows a burst of `burst` calls, refilled at
//! `per_second`.

use super::{Embedding, EmbeddingProvider};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::fmt;
use std::future::Future;
use std::num::NonZeroU32;

/// Provider wrapper that paces `embed` calls.
pub struct RateLimitedProvider<P> {
    inner: P,
    limiter: DefaultDirectRateLimiter,
    quota: Quota,
}

impl<P> RateLimitedProvider<P> {
    /// Wrap `inner` with a quota of `per_second` calls and a burst of
    /// `burst`. Zero values are raised to 1.
    #[must_use]
    pub fn new(inner: P, burst: u32, per_second: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN));
        Self {
            inner,
            limiter: RateLimiter::direct(quota),
            quota,
        }
    }

    /// The wrapped provider.
    #[must_use]
    pub const fn inner(&self) -> &P {
        &self.inner
    }

    /// Configured quota.
    #[must_use]
    pub const fn quota(&self) -> Quota {
        self.quota
    }
}

impl<P: fmt::Debug> fmt::Debug for RateLimitedProvider<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitedProvider")
            .field("inner", &self.inner)
            .field("quota", &self.quota)
            .finish_non_exhaustive()
    }
}

impl<P: EmbeddingProvider> EmbeddingProvider for RateLimitedProvider<P> {
    fn initialize(&self) -> impl Future<Output = anyhow::Result<()>> + Send {
        self.inner.initialize()
    }

    async fn embed(&self, text: &str) -> anyhow::Result<Embedding> {
        self.limiter.until_ready().await;
        self.inner.embed(text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbeddingProvider;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_burst_within_quota_is_immediate() {
        let provider = RateLimitedProvider::new(HashEmbeddingProvider::new(16), 5, 1);
        let start = Instant::now();
        for _ in 0..5 {
            provider.embed("burst").await.unwrap();
        }
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_paces_beyond_burst() {
        // one call up front, then one every 20ms
        let provider = RateLimitedProvider::new(HashEmbeddingProvider::new(16), 1, 50);
        let start = Instant::now();
        for _ in 0..4 {
            provider.embed("paced").await.unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(55));
    }

    #[tokio::test]
    async fn test_zero_quota_is_raised_to_one() {
        let provider = RateLimitedProvider::new(HashEmbeddingProvider::new(16), 0, 0);
        assert_eq!(provider.quota().burst_size().get(), 1);
        provider.embed("once").await.unwrap();
    }

    #[tokio::test]
    async fn test_rate_limited_provider_forwards() {
        let provider = RateLimitedProvider::new(HashEmbeddingProvider::new(16), 2, 100);
        provider.initialize().await.unwrap();
        let v = provider.embed("hello world").await.unwrap();
        assert_eq!(v, provider.inner().embed_sync("hello world"));
    }
}
