//! End-to-end question handling.
//!
//! [`Pipeline::ask`] runs the stages strictly in sequence:
//!
//! ```text
//! DuplicateQuestionGuard → VectorStore::search → ConfidenceGate → ConversationalAnswerer
//! ```
//!
//! The first three stages may end the request early with an advisory
//! [`Outcome`]; only a confident retrieval reaches the model. Advisory
//! outcomes leave the session history untouched.
//!
//! The pipeline holds no locks of its own. Callers must ensure at most one
//! `ask` per session is in flight.

use std::sync::Arc;

use tracing::{debug, info};

use crate::answerer::ConversationalAnswerer;
use crate::document::{prepare_documents, source_urls, DEFAULT_FALLBACK_URL};
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::gate::{ConfidenceGate, GateDecision, DEFAULT_CONFIDENCE_THRESHOLD};
use crate::guard::{DuplicateQuestionGuard, GuardVerdict, DEFAULT_DUPLICATE_THRESHOLD};
use crate::history::HistoryStore;
use crate::llm::ChatModel;
use crate::prompts::{
    qa_system_prompt, DUPLICATE_QUESTION_MESSAGE, EMPTY_KNOWLEDGE_BASE_MESSAGE,
    LOW_CONFIDENCE_MESSAGE,
};
use crate::store::VectorStore;

/// Tunables for one deployment.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Documents retrieved per query.
    pub top_k: usize,
    pub duplicate_threshold: f32,
    pub confidence_threshold: f32,
    /// Product named in the QA instruction.
    pub product_name: String,
    /// Citation for documents without a URL.
    pub fallback_url: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            top_k: 6,
            duplicate_threshold: DEFAULT_DUPLICATE_THRESHOLD,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            product_name: "ApostropheCMS".to_string(),
            fallback_url: DEFAULT_FALLBACK_URL.to_string(),
        }
    }
}

/// How a question was handled.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The model produced an answer.
    Answered { answer: String, sources: Vec<String> },
    /// The question repeats `prior` from the same session.
    DuplicateQuestion { prior: String, similarity: f32 },
    /// Retrieval returned nothing.
    EmptyKnowledgeBase,
    /// No retrieved document reached the confidence threshold.
    LowConfidence { best_score: f32 },
}

impl Outcome {
    /// The text to show the user.
    pub fn text(&self) -> &str {
        match self {
            Outcome::Answered { answer, .. } => answer,
            Outcome::DuplicateQuestion { .. } => DUPLICATE_QUESTION_MESSAGE,
            Outcome::EmptyKnowledgeBase => EMPTY_KNOWLEDGE_BASE_MESSAGE,
            Outcome::LowConfidence { .. } => LOW_CONFIDENCE_MESSAGE,
        }
    }

    /// Stable machine-readable label.
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Answered { .. } => "answer",
            Outcome::DuplicateQuestion { .. } => "duplicate_question",
            Outcome::EmptyKnowledgeBase => "empty_knowledge_base",
            Outcome::LowConfidence { .. } => "low_confidence",
        }
    }

    pub fn sources(&self) -> &[String] {
        match self {
            Outcome::Answered { sources, .. } => sources,
            _ => &[],
        }
    }

    pub fn is_answered(&self) -> bool {
        matches!(self, Outcome::Answered { .. })
    }
}

pub struct Pipeline {
    guard: DuplicateQuestionGuard,
    gate: ConfidenceGate,
    answerer: ConversationalAnswerer,
    store: Arc<dyn VectorStore>,
    history: Arc<dyn HistoryStore>,
    settings: PipelineSettings,
}

impl Pipeline {
    /// Wire the stages together. `embedder` is shared by the guard and the
    /// gate; pass a [`CachedEmbeddings`](crate::embedding::CachedEmbeddings)
    /// to avoid re-embedding the same texts.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        model: Arc<dyn ChatModel>,
        history: Arc<dyn HistoryStore>,
        settings: PipelineSettings,
    ) -> Self {
        let answerer = ConversationalAnswerer::new(
            model,
            store.clone(),
            history.clone(),
            qa_system_prompt(&settings.product_name),
            settings.top_k,
            settings.fallback_url.clone(),
        );
        Self {
            guard: DuplicateQuestionGuard::new(embedder.clone(), settings.duplicate_threshold),
            gate: ConfidenceGate::new(embedder, settings.confidence_threshold),
            answerer,
            store,
            history,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    /// Handle one question for `session_id`.
    ///
    /// Errors from the embedding provider, the vector store or the model
    /// propagate unchanged (model failures as
    /// [`Error::AnswerGenerationFailed`](crate::Error::AnswerGenerationFailed)).
    pub async fn ask(&self, session_id: &str, question: &str) -> Result<Outcome> {
        let history = self.history.messages(session_id).await?;

        if let GuardVerdict::Duplicate { prior, similarity } =
            self.guard.check(question, &history).await?
        {
            info!(session = session_id, similarity, "duplicate question");
            return Ok(Outcome::DuplicateQuestion { prior, similarity });
        }

        let retrieved = self.store.search(question, self.settings.top_k).await?;
        let retrieved = prepare_documents(retrieved, &self.settings.fallback_url);
        debug!(session = session_id, docs = retrieved.len(), "retrieved for confidence check");

        match self.gate.evaluate(question, &retrieved).await? {
            GateDecision::Empty => {
                info!(session = session_id, "knowledge base returned no documents");
                return Ok(Outcome::EmptyKnowledgeBase);
            }
            GateDecision::LowConfidence { best_score } => {
                info!(session = session_id, best_score, "retrieval confidence too low");
                return Ok(Outcome::LowConfidence { best_score });
            }
            GateDecision::Confident { best_score } => {
                debug!(session = session_id, best_score, "retrieval confident");
            }
        }

        let answer = self
            .answerer
            .answer_with_history(session_id, question, history)
            .await?;
        info!(
            session = session_id,
            docs = answer.documents.len(),
            "answered question"
        );

        Ok(Outcome::Answered {
            sources: source_urls(&answer.documents),
            answer: answer.text,
        })
    }
}
