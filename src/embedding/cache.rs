// CachingEmbedder: a content-hash memoizing Embedder decorator. Wraps
// another Embedder and skips the call entirely when the exact chunk text
// was embedded before, which matters for repeated boilerplate (license
// headers, generated getters) across a project's files.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::error::Result;

use super::Embedder;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

pub struct CachingEmbedder {
    inner: Arc<dyn Embedder>,
    cache: Mutex<LruCache<String, Vec<f32>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachingEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, capacity: usize) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(NonZeroUsize::new(capacity.max(1)).unwrap())),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn hash(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn stats(&self) -> CacheStats {
        let cache = self.cache.lock();
        CacheStats {
            entries: cache.len(),
            capacity: cache.cap().get(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn clear(&self) {
        self.cache.lock().clear();
    }
}

#[async_trait]
impl Embedder for CachingEmbedder {
    async fn initialize(&self) -> Result<()> {
        self.inner.initialize().await
    }

    async fn dispose(&self) -> Result<()> {
        self.inner.dispose().await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = Self::hash(text);
        if let Some(vector) = self.cache.lock().get(&key).cloned() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(vector);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let vector = self.inner.embed(text).await?;
        self.cache.lock().put(key, vector.clone());
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::NullEmbedder;
    use std::sync::atomic::AtomicUsize;

    struct CountingEmbedder {
        inner: NullEmbedder,
        calls: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                inner: NullEmbedder::default(),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn initialize(&self) -> Result<()> {
            Ok(())
        }

        async fn dispose(&self) -> Result<()> {
            Ok(())
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.inner.embed(text).await
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }
    }

    #[tokio::test]
    async fn repeated_text_hits_cache_without_recalling_inner() {
        let counting = Arc::new(CountingEmbedder::new());
        let cached = CachingEmbedder::new(counting.clone(), 10);

        let first = cached.embed("fn greet() {}").await.unwrap();
        let second = cached.embed("fn greet() {}").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(counting.call_count(), 1);
        assert_eq!(cached.stats().hits, 1);
        assert_eq!(cached.stats().misses, 1);
    }

    #[tokio::test]
    async fn distinct_text_both_call_inner() {
        let counting = Arc::new(CountingEmbedder::new());
        let cached = CachingEmbedder::new(counting.clone(), 10);

        cached.embed("fn a() {}").await.unwrap();
        cached.embed("fn b() {}").await.unwrap();

        assert_eq!(counting.call_count(), 2);
        assert_eq!(cached.stats().entries, 2);
    }

    #[tokio::test]
    async fn eviction_respects_capacity() {
        let counting = Arc::new(CountingEmbedder::new());
        let cached = CachingEmbedder::new(counting.clone(), 2);

        cached.embed("a").await.unwrap();
        cached.embed("b").await.unwrap();
        cached.embed("c").await.unwrap();
        assert_eq!(cached.stats().entries, 2);

        // "a" was evicted first, so re-embedding it must hit the inner embedder again.
        cached.embed("a").await.unwrap();
        assert_eq!(counting.call_count(), 4);
    }

    #[test]
    fn clear_empties_the_cache() {
        let cached = CachingEmbedder::new(Arc::new(NullEmbedder::default()), 10);
        let stats_before = cached.stats();
        assert_eq!(stats_before.entries, 0);
        cached.clear();
        assert_eq!(cached.stats().entries, 0);
    }
}
