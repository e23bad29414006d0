//! Digest resolution seam and per-file memoization.

use std::collections::HashMap;
use std::sync::Arc;

use a3s_lock_core::error::Result;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::oci::{Digest, ImageReference};

/// Resolves an image reference to its current manifest digest.
#[async_trait]
pub trait DigestResolver: Send + Sync {
    /// Resolve by tag when present, otherwise by the existing digest,
    /// otherwise by `latest`.
    async fn resolve(&self, reference: &ImageReference) -> Result<Digest>;
}

#[async_trait]
impl<T: DigestResolver + ?Sized> DigestResolver for Arc<T> {
    async fn resolve(&self, reference: &ImageReference) -> Result<Digest> {
        (**self).resolve(reference).await
    }
}

/// Lookup identity: API host, API repository, tag or digest.
type CacheKey = (String, String, String);

fn cache_key(reference: &ImageReference) -> CacheKey {
    (
        reference.api_host().to_string(),
        reference.api_repository(),
        reference.lookup_key(),
    )
}

/// Memoizes resolutions so an image used by several stages is fetched once.
///
/// Failures are remembered too. Meant to live for one Dockerfile.
pub struct CachingResolver<R> {
    inner: R,
    cache: Mutex<HashMap<CacheKey, Result<Digest>>>,
}

impl<R: DigestResolver> CachingResolver<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Number of distinct lookups performed so far.
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}

#[async_trait]
impl<R: DigestResolver> DigestResolver for CachingResolver<R> {
    async fn resolve(&self, reference: &ImageReference) -> Result<Digest> {
        let key = cache_key(reference);
        let cached = self.cache.lock().get(&key).cloned();
        if let Some(cached) = cached {
            tracing::debug!(reference = %reference, "Using memoized resolution");
            return cached;
        }

        let result = self.inner.resolve(reference).await;
        self.cache.lock().insert(key, result.clone());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use a3s_lock_core::error::LockError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingResolver {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl DigestResolver for CountingResolver {
        async fn resolve(&self, reference: &ImageReference) -> Result<Digest> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LockError::NotFoundError {
                    registry: reference.registry_or_default().to_string(),
                    message: "manifest unknown".to_string(),
                });
            }
            Ok(Digest::sha256_of(reference.lookup_key().as_bytes()))
        }
    }

    fn counting(fail: bool) -> Arc<CountingResolver> {
        Arc::new(CountingResolver {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    fn r(s: &str) -> ImageReference {
        ImageReference::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_identical_lookups_hit_cache() {
        let inner = counting(false);
        let resolver = CachingResolver::new(inner.clone());

        let a = resolver.resolve(&r("golang:1.16")).await.unwrap();
        let b = resolver.resolve(&r("golang:1.16")).await.unwrap();

        assert_eq!(a, b);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.len(), 1);
    }

    #[tokio::test]
    async fn test_docker_hub_spellings_share_entry() {
        let inner = counting(false);
        let resolver = CachingResolver::new(inner.clone());

        resolver.resolve(&r("python:3.8")).await.unwrap();
        resolver.resolve(&r("library/python:3.8")).await.unwrap();
        resolver.resolve(&r("docker.io/library/python:3.8")).await.unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_tags_are_separate() {
        let inner = counting(false);
        let resolver = CachingResolver::new(inner.clone());

        resolver.resolve(&r("python:3.8")).await.unwrap();
        resolver.resolve(&r("python:3.9")).await.unwrap();
        resolver.resolve(&r("quay.io/python:3.8")).await.unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failures_are_memoized() {
        let inner = counting(true);
        let resolver = CachingResolver::new(inner.clone());

        assert!(resolver.resolve(&r("missing:1")).await.is_err());
        let err = resolver.resolve(&r("missing:1")).await.unwrap_err();

        assert!(matches!(err, LockError::NotFoundError { .. }));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_new_is_empty() {
        let resolver = CachingResolver::new(counting(false));
        assert!(resolver.is_empty());
    }
}
