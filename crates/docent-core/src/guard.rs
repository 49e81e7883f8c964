//! Duplicate question detection.
//!
//! Re-asking the same question tends to make the model restate, and
//! embellish, its previous answer. [`DuplicateQuestionGuard`] compares a new
//! question against every earlier human message of the session and flags a
//! repeat when the embeddings are close enough.

use std::sync::Arc;

use tracing::debug;

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::models::Message;
use crate::similarity::cosine_similarity;

/// Default minimum similarity for two questions to count as the same.
pub const DEFAULT_DUPLICATE_THRESHOLD: f32 = 0.85;

#[derive(Debug, Clone, PartialEq)]
pub enum GuardVerdict {
    /// No earlier question is close enough.
    Novel,
    /// `prior` is an earlier question with `similarity >= threshold`.
    Duplicate { prior: String, similarity: f32 },
}

impl GuardVerdict {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, GuardVerdict::Duplicate { .. })
    }
}

pub struct DuplicateQuestionGuard {
    embedder: Arc<dyn EmbeddingProvider>,
    threshold: f32,
}

impl DuplicateQuestionGuard {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, threshold: f32) -> Self {
        Self {
            embedder,
            threshold,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Compare `question` against the human messages in `history`.
    ///
    /// Cost is one embedding per earlier question (cached embedders make
    /// repeats free). Stops at the first match.
    pub async fn check(&self, question: &str, history: &[Message]) -> Result<GuardVerdict> {
        let priors: Vec<&Message> = history.iter().filter(|m| m.is_human()).collect();
        if priors.is_empty() {
            return Ok(GuardVerdict::Novel);
        }

        let question_vec = self.embedder.embed(question).await?;
        for prior in priors {
            let prior_vec = self.embedder.embed(&prior.content).await?;
            let similarity = cosine_similarity(&question_vec, &prior_vec)?;
            debug!(similarity, threshold = self.threshold, "compared with earlier question");
            if similarity >= self.threshold {
                return Ok(GuardVerdict::Duplicate {
                    prior: prior.content.clone(),
                    similarity,
                });
            }
        }

        Ok(GuardVerdict::Novel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct TableProvider(HashMap<&'static str, Vec<f32>>);

    #[async_trait]
    impl EmbeddingProvider for TableProvider {
        fn model_name(&self) -> &str {
            "table"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            texts
                .iter()
                .map(|t| {
                    self.0
                        .get(t.as_str())
                        .cloned()
                        .ok_or_else(|| Error::EmbeddingProvider(format!("no vector for {t}")))
                })
                .collect()
        }
    }

    fn guard() -> DuplicateQuestionGuard {
        let table = HashMap::from([
            ("How do I add a widget?", vec![1.0, 0.0]),
            ("How can I add a widget?", vec![0.98, 0.2]),
            ("How do I deploy?", vec![0.0, 1.0]),
        ]);
        DuplicateQuestionGuard::new(Arc::new(TableProvider(table)), DEFAULT_DUPLICATE_THRESHOLD)
    }

    #[tokio::test]
    async fn empty_history_is_novel_without_embedding() {
        // "unknown" has no vector, so any embedding call would fail.
        let verdict = guard().check("unknown", &[]).await.unwrap();
        assert_eq!(verdict, GuardVerdict::Novel);
    }

    #[tokio::test]
    async fn paraphrase_is_duplicate() {
        let history = vec![
            Message::human("How do I add a widget?"),
            Message::ai("Use the widget manager."),
        ];
        let verdict = guard().check("How can I add a widget?", &history).await.unwrap();
        match verdict {
            GuardVerdict::Duplicate { prior, similarity } => {
                assert_eq!(prior, "How do I add a widget?");
                assert!(similarity >= 0.85);
            }
            GuardVerdict::Novel => panic!("expected duplicate"),
        }
    }

    #[tokio::test]
    async fn answers_are_not_compared() {
        // The AI message text matches exactly but only human turns count.
        let history = vec![
            Message::human("How do I deploy?"),
            Message::ai("How do I add a widget?"),
        ];
        let verdict = guard().check("How do I add a widget?", &history).await.unwrap();
        assert!(!verdict.is_duplicate());
    }

    #[tokio::test]
    async fn embedding_failure_propagates() {
        let history = vec![Message::human("How do I deploy?")];
        let err = guard().check("unknown", &history).await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingProvider(_)));
    }
}
