//! In-memory [`VectorStore`] implementation for tests and small corpora.
//!
//! Documents and their vectors live in a `Vec` behind `std::sync::RwLock`.
//! Search is brute-force cosine similarity over every stored vector.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::models::Document;
use crate::similarity::cosine_similarity;

use super::{top_k, VectorStore};

struct StoredDocument {
    document: Document,
    vector: Vec<f32>,
}

/// In-memory store that embeds queries with the same provider used to
/// embed its documents.
pub struct InMemoryVectorStore {
    embedder: Arc<dyn EmbeddingProvider>,
    docs: RwLock<Vec<StoredDocument>>,
}

impl InMemoryVectorStore {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            docs: RwLock::new(Vec::new()),
        }
    }

    /// Embed and add documents.
    pub async fn add_documents(&self, documents: Vec<Document>) -> Result<()> {
        let texts: Vec<String> = documents.iter().map(|d| d.page_content.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        let mut docs = self.docs.write().unwrap_or_else(PoisonError::into_inner);
        for (document, vector) in documents.into_iter().zip(vectors) {
            docs.push(StoredDocument { document, vector });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.docs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed(query).await?;

        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        let mut scored = Vec::with_capacity(docs.len());
        for stored in docs.iter() {
            let score = cosine_similarity(&query_vec, &stored.vector)?;
            scored.push((score, stored.document.clone()));
        }
        drop(docs);

        Ok(top_k(scored, k).into_iter().map(|(_, d)| d).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Maps a handful of keywords to fixed axes.
    struct AxisProvider;

    #[async_trait]
    impl EmbeddingProvider for AxisProvider {
        fn model_name(&self) -> &str {
            "axis"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    vec![
                        if t.contains("widget") { 1.0 } else { 0.0 },
                        if t.contains("page") { 1.0 } else { 0.0 },
                        if t.contains("deploy") { 1.0 } else { 0.0 },
                    ]
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn search_orders_by_similarity() {
        let store = InMemoryVectorStore::new(Arc::new(AxisProvider));
        store
            .add_documents(vec![
                Document::new("Deploy to production"),
                Document::new("Widget and page basics"),
                Document::new("Widget options"),
            ])
            .await
            .unwrap();

        let docs = store.search("widget", 2).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].page_content, "Widget options");
        assert_eq!(docs[1].page_content, "Widget and page basics");
    }

    #[tokio::test]
    async fn empty_store_returns_nothing() {
        let store = InMemoryVectorStore::new(Arc::new(AxisProvider));
        assert!(store.search("widget", 6).await.unwrap().is_empty());
    }
}
