//! Embedding provider trait and the embedding cache.
//!
//! Defines the [`EmbeddingProvider`] trait that all embedding backends
//! implement, plus [`CachedEmbeddings`], a bounded LRU cache keyed by the
//! exact input text that wraps any provider.
//!
//! Concrete provider implementations (OpenAI, Ollama) live in the `docent`
//! app crate.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use lru::LruCache;

use crate::error::{Error, Result};

/// Trait for embedding providers.
///
/// Vectors produced by one provider are only comparable with vectors from
/// the same provider and model.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::EmbeddingProvider("empty embedding response".to_string()))
    }
}

/// Hit/miss counters for a [`CachedEmbeddings`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// LRU embedding cache in front of another [`EmbeddingProvider`].
///
/// Concurrent misses for the same text may both reach the inner provider;
/// the second insert simply overwrites the first with an equal vector.
/// The lock is never held across an `.await`.
pub struct CachedEmbeddings {
    inner: Arc<dyn EmbeddingProvider>,
    cache: Mutex<LruCache<String, Vec<f32>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachedEmbeddings {
    /// Wrap `inner` with a cache of at most `capacity` entries.
    /// A capacity of `0` leaves the cache unbounded.
    pub fn new(inner: Arc<dyn EmbeddingProvider>, capacity: usize) -> Self {
        let cache = match NonZeroUsize::new(capacity) {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };
        Self {
            inner,
            cache: Mutex::new(cache),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Drop every cached vector.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, Vec<f32>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, text: &str) -> Option<Vec<f32>> {
        let found = self.lock().get(text).cloned();
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }
}

#[async_trait]
impl EmbeddingProvider for CachedEmbeddings {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dims(&self) -> usize {
        self.inner.dims()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out: Vec<Option<Vec<f32>>> = texts.iter().map(|t| self.lookup(t)).collect();

        let missing: Vec<usize> = out
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_none())
            .map(|(i, _)| i)
            .collect();

        if !missing.is_empty() {
            let batch: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
            let vectors = self.inner.embed_batch(&batch).await?;
            if vectors.len() != batch.len() {
                return Err(Error::EmbeddingProvider(format!(
                    "provider returned {} vectors for {} inputs",
                    vectors.len(),
                    batch.len()
                )));
            }

            let mut cache = self.lock();
            for (&i, vector) in missing.iter().zip(vectors) {
                cache.put(texts[i].clone(), vector.clone());
                out[i] = Some(vector);
            }
        }

        Ok(out.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Embeds text as `[len, 1.0]` and counts how many texts reach it.
    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        fn model_name(&self) -> &str {
            "counting"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(texts.len(), Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    fn counting() -> Arc<CountingProvider> {
        Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn repeated_text_hits_cache() {
        let inner = counting();
        let cached = CachedEmbeddings::new(inner.clone(), 16);

        let a = cached.embed("hello").await.unwrap();
        let b = cached.embed("hello").await.unwrap();

        assert_eq!(a, b);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        let stats = cached.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[tokio::test]
    async fn cache_key_is_exact_text() {
        let inner = counting();
        let cached = CachedEmbeddings::new(inner.clone(), 16);

        cached.embed("Widget").await.unwrap();
        cached.embed("widget").await.unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn batch_only_sends_misses_and_keeps_order() {
        let inner = counting();
        let cached = CachedEmbeddings::new(inner.clone(), 16);
        cached.embed("bb").await.unwrap();

        let texts = vec!["a".to_string(), "bb".to_string(), "cccc".to_string()];
        let vectors = cached.embed_batch(&texts).await.unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
        assert_eq!(vectors[0][0], 1.0);
        assert_eq!(vectors[1][0], 2.0);
        assert_eq!(vectors[2][0], 4.0);
    }

    #[tokio::test]
    async fn capacity_evicts_least_recently_used() {
        let inner = counting();
        let cached = CachedEmbeddings::new(inner.clone(), 2);

        cached.embed("one").await.unwrap();
        cached.embed("two").await.unwrap();
        cached.embed("three").await.unwrap();
        assert_eq!(cached.len(), 2);

        cached.embed("one").await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn clear_empties_cache() {
        let cached = CachedEmbeddings::new(counting(), 0);
        cached.embed("x").await.unwrap();
        assert!(!cached.is_empty());
        cached.clear();
        assert!(cached.is_empty());
    }
}
