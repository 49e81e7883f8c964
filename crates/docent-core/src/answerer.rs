//! History-aware retrieval and grounded answering.
//!
//! Answering is a two-call protocol against the [`ChatModel`]:
//!
//! 1. **Contextualize**: with prior turns present, the model rewrites the
//!    question into a standalone query (resolving "it", "that option", ...)
//!    in the question's own language. The rewrite only drives retrieval and
//!    is never shown to the user.
//! 2. **Answer**: documents retrieved for the standalone query are
//!    formatted as `{page_content}\nURL: {url}` and handed to the model
//!    together with the QA instruction, the full history and the raw
//!    question.
//!
//! On success the question and the answer are appended to the session, in
//! that order. Nothing is appended on failure.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::document::{context_block, prepare_documents};
use crate::error::{Error, Result};
use crate::history::HistoryStore;
use crate::llm::{ChatModel, CompletionRequest};
use crate::models::{Document, Message};
use crate::prompts::CONTEXTUALIZE_SYSTEM_PROMPT;
use crate::store::VectorStore;

/// Result of a successful answer.
#[derive(Debug, Clone)]
pub struct Answer {
    /// The model's reply, verbatim.
    pub text: String,
    /// The query used for retrieval.
    pub standalone_query: String,
    /// Documents that were placed in the model's context.
    pub documents: Vec<Document>,
}

pub struct ConversationalAnswerer {
    model: Arc<dyn ChatModel>,
    store: Arc<dyn VectorStore>,
    history: Arc<dyn HistoryStore>,
    qa_prompt: String,
    top_k: usize,
    fallback_url: String,
}

impl ConversationalAnswerer {
    pub fn new(
        model: Arc<dyn ChatModel>,
        store: Arc<dyn VectorStore>,
        history: Arc<dyn HistoryStore>,
        qa_prompt: impl Into<String>,
        top_k: usize,
        fallback_url: impl Into<String>,
    ) -> Self {
        Self {
            model,
            store,
            history,
            qa_prompt: qa_prompt.into(),
            top_k,
            fallback_url: fallback_url.into(),
        }
    }

    /// Rewrite `question` into a standalone query given `history`.
    ///
    /// With an empty history the question is returned as is, without a
    /// model call. A blank rewrite also falls back to the raw question.
    pub async fn contextualize(&self, question: &str, history: &[Message]) -> Result<String> {
        if history.is_empty() {
            return Ok(question.to_string());
        }
        let request = CompletionRequest::new(CONTEXTUALIZE_SYSTEM_PROMPT, question)
            .with_history(history.to_vec());
        let rewritten = self.model.complete(request).await?;
        let rewritten = rewritten.trim();
        if rewritten.is_empty() {
            Ok(question.to_string())
        } else {
            Ok(rewritten.to_string())
        }
    }

    /// Answer `question` for `session_id`, loading the session history.
    pub async fn answer(&self, session_id: &str, question: &str) -> Result<Answer> {
        let history = self.history.messages(session_id).await?;
        self.answer_with_history(session_id, question, history).await
    }

    /// Answer with a history the caller already loaded.
    pub async fn answer_with_history(
        &self,
        session_id: &str,
        question: &str,
        history: Vec<Message>,
    ) -> Result<Answer> {
        let standalone_query = self
            .contextualize(question, &history)
            .await
            .map_err(generation_failed)?;
        debug!(session = session_id, query = %standalone_query, "contextualized question");

        let documents = self.store.search(&standalone_query, self.top_k).await?;
        let documents = prepare_documents(documents, &self.fallback_url);
        debug!(session = session_id, docs = documents.len(), "retrieved answer context");

        let request = CompletionRequest::new(self.qa_prompt.clone(), question)
            .with_history(history)
            .with_context(context_block(&documents));
        let text = self.model.complete(request).await.map_err(generation_failed)?;
        if text.trim().is_empty() {
            return Err(generation_failed(Error::ModelInvocation(
                "model returned an empty answer".to_string(),
            )));
        }

        self.history
            .append_messages(
                session_id,
                vec![Message::human(question), Message::ai(text.clone())],
            )
            .await?;

        Ok(Answer {
            text,
            standalone_query,
            documents,
        })
    }
}

fn generation_failed(err: Error) -> Error {
    warn!(error = %err, "answer generation failed");
    match err {
        Error::AnswerGenerationFailed(_) => err,
        other => Error::AnswerGenerationFailed(Box::new(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::InMemoryHistory;
    use crate::prompts::qa_system_prompt;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Returns scripted replies in order and records every request.
    struct ScriptedModel {
        replies: Mutex<Vec<Result<String>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        fn model_name(&self) -> &str {
            "scripted"
        }
        async fn complete(&self, request: CompletionRequest) -> Result<String> {
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(Error::model("no scripted reply")))
        }
    }

    /// Returns the same documents for every query and records queries.
    struct FixedStore {
        docs: Vec<Document>,
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl VectorStore for FixedStore {
        async fn search(&self, query: &str, k: usize) -> Result<Vec<Document>> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.docs.iter().take(k).cloned().collect())
        }
    }

    fn store() -> Arc<FixedStore> {
        Arc::new(FixedStore {
            docs: vec![
                Document::new("Widgets are reusable content blocks.\nReference URL: https://docs.apostrophecms.org/widgets"),
                Document::new("Pages hold areas."),
            ],
            queries: Mutex::new(Vec::new()),
        })
    }

    fn answerer(
        model: Arc<ScriptedModel>,
        store: Arc<FixedStore>,
        history: Arc<InMemoryHistory>,
    ) -> ConversationalAnswerer {
        ConversationalAnswerer::new(
            model,
            store,
            history,
            qa_system_prompt("ApostropheCMS"),
            6,
            "https://docs.apostrophecms.org/",
        )
    }

    #[tokio::test]
    async fn first_turn_skips_contextualization() {
        let model = ScriptedModel::new(vec![Ok("Widgets are blocks.".into())]);
        let store = store();
        let history = Arc::new(InMemoryHistory::default());
        let answer = answerer(model.clone(), store.clone(), history.clone())
            .answer("s1", "What is a widget?")
            .await
            .unwrap();

        assert_eq!(answer.text, "Widgets are blocks.");
        assert_eq!(answer.standalone_query, "What is a widget?");
        assert_eq!(model.requests().len(), 1);
        assert_eq!(store.queries.lock().unwrap().as_slice(), ["What is a widget?"]);

        let context = model.requests()[0].context.clone().unwrap();
        assert!(context.contains(
            "Widgets are reusable content blocks.\nURL: https://docs.apostrophecms.org/widgets"
        ));
        assert!(context.contains("Pages hold areas.\nURL: https://docs.apostrophecms.org/"));
        assert!(!context.contains("Reference URL:"));

        let log = history.messages("s1").await.unwrap();
        assert_eq!(log, vec![Message::human("What is a widget?"), Message::ai("Widgets are blocks.")]);
    }

    #[tokio::test]
    async fn follow_up_retrieves_with_rewritten_query() {
        let model = ScriptedModel::new(vec![
            Ok("How do I configure widget options?".into()),
            Ok("Use the fields option.".into()),
        ]);
        let store = store();
        let history = Arc::new(InMemoryHistory::default());
        history.append_message("s1", Message::human("What is a widget?")).await.unwrap();
        history.append_message("s1", Message::ai("A block.")).await.unwrap();

        let answer = answerer(model.clone(), store.clone(), history.clone())
            .answer("s1", "How do I configure it?")
            .await
            .unwrap();

        assert_eq!(answer.standalone_query, "How do I configure widget options?");
        assert_eq!(
            store.queries.lock().unwrap().as_slice(),
            ["How do I configure widget options?"]
        );

        let requests = model.requests();
        assert_eq!(requests[0].system_prompt, CONTEXTUALIZE_SYSTEM_PROMPT);
        assert_eq!(requests[0].history.len(), 2);
        // The answering call sees the raw question, not the rewrite.
        assert_eq!(requests[1].user_input, "How do I configure it?");
        assert_eq!(requests[1].history.len(), 2);

        assert_eq!(history.messages("s1").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn model_failure_appends_nothing() {
        let model = ScriptedModel::new(vec![Err(Error::model("timeout"))]);
        let history = Arc::new(InMemoryHistory::default());
        let err = answerer(model, store(), history.clone())
            .answer("s1", "What is a widget?")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::AnswerGenerationFailed(_)));
        assert!(history.messages("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn contextualization_failure_appends_nothing() {
        let model = ScriptedModel::new(vec![Err(Error::model("rate limited"))]);
        let history = Arc::new(InMemoryHistory::default());
        history.append_message("s1", Message::human("earlier")).await.unwrap();

        let err = answerer(model, store(), history.clone())
            .answer("s1", "and then?")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::AnswerGenerationFailed(_)));
        assert_eq!(history.messages("s1").await.unwrap().len(), 1);
    }

    /// Accepts single appends but rejects every batched write.
    struct RejectingHistory {
        inner: InMemoryHistory,
    }

    #[async_trait]
    impl HistoryStore for RejectingHistory {
        async fn messages(&self, session_id: &str) -> Result<Vec<Message>> {
            self.inner.messages(session_id).await
        }
        async fn append_message(&self, session_id: &str, message: Message) -> Result<()> {
            self.inner.append_message(session_id, message).await
        }
        async fn append_messages(&self, _session_id: &str, _messages: Vec<Message>) -> Result<()> {
            Err(Error::History("disk full".to_string()))
        }
        async fn session_count(&self) -> Result<usize> {
            self.inner.session_count().await
        }
    }

    #[tokio::test]
    async fn history_write_failure_leaves_no_partial_turn() {
        let model = ScriptedModel::new(vec![Ok("Widgets are blocks.".into())]);
        let history = Arc::new(RejectingHistory {
            inner: InMemoryHistory::default(),
        });
        let answerer = ConversationalAnswerer::new(
            model,
            store(),
            history.clone(),
            qa_system_prompt("ApostropheCMS"),
            6,
            "https://docs.apostrophecms.org/",
        );

        let err = answerer.answer("s1", "What is a widget?").await.unwrap_err();

        assert!(matches!(err, Error::History(_)));
        assert!(history.messages("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_answer_is_a_failure() {
        let model = ScriptedModel::new(vec![Ok("   ".into())]);
        let history = Arc::new(InMemoryHistory::default());
        let err = answerer(model, store(), history.clone())
            .answer("s1", "What is a widget?")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::AnswerGenerationFailed(_)));
        assert!(history.messages("s1").await.unwrap().is_empty());
    }
}
