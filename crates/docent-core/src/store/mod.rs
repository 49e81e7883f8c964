//! Retrieval abstraction.
//!
//! The [`VectorStore`] trait is the only view the pipeline has of the
//! knowledge base: a text query in, nearest documents out. Index
//! construction and durability belong to the implementation.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Document;

/// Nearest-neighbour search over the embedded knowledge base.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Return at most `k` documents ordered by decreasing similarity to
    /// `query`. An empty knowledge base yields an empty vector, not an
    /// error; failures never return partial results.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Document>>;
}

/// Sort `(score, item)` pairs by descending score and keep the first `k`.
pub fn top_k<T>(mut scored: Vec<(f32, T)>, k: usize) -> Vec<(f32, T)> {
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored
}
