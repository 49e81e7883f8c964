//! SQLite-backed knowledge base.
//!
//! Each row of `kb_documents` holds one documentation chunk, its metadata
//! as JSON and its embedding as a little-endian `f32` BLOB. Search embeds
//! the query and scores every stored vector with cosine similarity in
//! Rust; the collection is small enough that a brute-force scan is fine.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};

use docent_core::embedding::EmbeddingProvider;
use docent_core::similarity::cosine_similarity;
use docent_core::store::{top_k, VectorStore};
use docent_core::{Document, Error};

/// Encode a float vector as little-endian bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB written by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Stable row id: SHA-256 over content and URL, hex encoded.
pub fn document_id(doc: &Document) -> String {
    let mut hasher = Sha256::new();
    hasher.update(doc.page_content.as_bytes());
    hasher.update(b"\n");
    hasher.update(doc.url().unwrap_or_default().as_bytes());
    hex::encode(hasher.finalize())
}

pub struct SqliteVectorStore {
    pool: SqlitePool,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { pool, embedder }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or replace `docs` with their precomputed `vectors`.
    ///
    /// Returns the number of rows written.
    pub async fn upsert(&self, docs: &[Document], vectors: &[Vec<f32>]) -> Result<usize> {
        if docs.len() != vectors.len() {
            anyhow::bail!(
                "{} documents but {} embeddings",
                docs.len(),
                vectors.len()
            );
        }

        let model = self.embedder.model_name().to_string();
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for (doc, vector) in docs.iter().zip(vectors) {
            let metadata_json = serde_json::to_string(&doc.metadata)?;
            sqlx::query(
                r#"
                INSERT INTO kb_documents (id, page_content, metadata_json, embedding, model, dims, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    page_content = excluded.page_content,
                    metadata_json = excluded.metadata_json,
                    embedding = excluded.embedding,
                    model = excluded.model,
                    dims = excluded.dims,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(document_id(doc))
            .bind(&doc.page_content)
            .bind(metadata_json)
            .bind(vec_to_blob(vector))
            .bind(&model)
            .bind(vector.len() as i64)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(docs.len())
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kb_documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn search(&self, query: &str, k: usize) -> docent_core::Result<Vec<Document>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query("SELECT page_content, metadata_json, embedding FROM kb_documents")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::vector_store)?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = self.embedder.embed(query).await?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let similarity = cosine_similarity(&query_vec, &blob_to_vec(&blob))?;

            let metadata_json: String = row.get("metadata_json");
            let metadata = serde_json::from_str(&metadata_json).map_err(Error::vector_store)?;
            scored.push((
                similarity,
                Document {
                    page_content: row.get("page_content"),
                    metadata,
                },
            ));
        }

        Ok(top_k(scored, k).into_iter().map(|(_, doc)| doc).collect())
    }
}
