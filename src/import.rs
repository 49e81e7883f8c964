//! Knowledge-base import from JSON Lines.
//!
//! Each non-blank line is one document:
//!
//! ```json
//! {"page_content": "Widgets are reusable blocks...", "metadata": {"url": "https://docs.apostrophecms.org/widgets"}}
//! ```
//!
//! Documents are embedded `embedding.batch_size` at a time and upserted
//! into `kb_documents`. Re-importing the same content and URL replaces the
//! existing row.

use std::io::BufRead;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;

use docent_core::embedding::EmbeddingProvider;
use docent_core::Document;

use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::sqlite_store::SqliteVectorStore;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportStats {
    pub read: usize,
    pub written: usize,
}

/// Parse JSONL documents, skipping blank lines.
pub fn parse_jsonl<R: BufRead>(reader: R) -> Result<Vec<Document>> {
    let mut docs = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let doc: Document = serde_json::from_str(&line)
            .with_context(|| format!("invalid document on line {}", index + 1))?;
        docs.push(doc);
    }
    Ok(docs)
}

pub async fn run_import(config: &Config, path: &Path) -> Result<ImportStats> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open import file: {}", path.display()))?;
    let docs = parse_jsonl(std::io::BufReader::new(file))?;

    let provider = embedding::create_provider(&config.embedding)?;
    let pool = db::connect_with_retry(config).await?;
    let store = SqliteVectorStore::new(pool, provider.clone());

    let mut stats = ImportStats {
        read: docs.len(),
        written: 0,
    };

    for batch in docs.chunks(config.embedding.batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|d| d.page_content.clone()).collect();
        let vectors = provider.embed_batch(&texts).await?;
        stats.written += store.upsert(batch, &vectors).await?;
        info!(written = stats.written, total = stats.read, "imported batch");
    }

    store.pool().close().await;
    Ok(stats)
}
