//! The assistant as the CLI and HTTP server see it.
//!
//! [`Assistant`] owns a [`Pipeline`] and serializes questions per session
//! before handing them over. [`build_assistant`] wires the production
//! backends from configuration: the cached embedding provider, the SQLite
//! knowledge base (opened with startup retry), the chat model and the
//! bounded in-memory history.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use docent_core::embedding::{CacheStats, CachedEmbeddings, EmbeddingProvider};
use docent_core::history::{HistoryStore, InMemoryHistory};
use docent_core::llm::ChatModel;
use docent_core::{Message, Outcome, Pipeline, PipelineSettings};

use crate::config::Config;
use crate::session::SessionLocks;
use crate::sqlite_store::SqliteVectorStore;
use crate::{db, embedding, llm};

pub struct Assistant {
    pipeline: Pipeline,
    cache: Option<Arc<CachedEmbeddings>>,
    locks: SessionLocks,
}

impl Assistant {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            cache: None,
            locks: SessionLocks::new(),
        }
    }

    /// Report statistics of the embedding cache shared by the pipeline.
    pub fn with_cache(mut self, cache: Arc<CachedEmbeddings>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        self.pipeline.settings()
    }

    /// Answer `question` for `session_id`, waiting for any earlier request
    /// of the same session to finish first.
    pub async fn ask(&self, session_id: &str, question: &str) -> docent_core::Result<Outcome> {
        let _guard = self.locks.lock(session_id).await;
        let result = self.pipeline.ask(session_id, question).await;
        if let Err(e) = &result {
            warn!(session = session_id, error = %e, "question failed");
        }
        result
    }

    pub async fn history(&self, session_id: &str) -> docent_core::Result<Vec<Message>> {
        self.pipeline.history().messages(session_id).await
    }

    pub async fn session_count(&self) -> docent_core::Result<usize> {
        self.pipeline.history().session_count().await
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|cache| cache.stats())
    }
}

/// Connect every backend named in `config` and assemble the assistant.
///
/// Fails when the knowledge base stays unreachable after
/// `db.connect_attempts` tries, or when a provider cannot be configured.
pub async fn build_assistant(config: &Config) -> Result<Assistant> {
    let cache = embedding::create_cached_provider(&config.embedding)?;
    let model = llm::create_chat_model(&config.llm)?;
    let pool = db::connect_with_retry(config).await?;
    let store = Arc::new(SqliteVectorStore::new(pool, cache.clone()));
    let history = Arc::new(InMemoryHistory::new(config.history.max_sessions));

    info!(
        embedding = cache.model_name(),
        model = model.model_name(),
        "assistant ready"
    );

    let pipeline = Pipeline::new(
        cache.clone(),
        store,
        model,
        history,
        config.pipeline_settings(),
    );
    Ok(Assistant::new(pipeline).with_cache(cache))
}
