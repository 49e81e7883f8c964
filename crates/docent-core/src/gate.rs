//! Retrieval confidence gate.
//!
//! Decides, before any model call, whether the retrieved evidence is
//! strong enough to answer from. The gate scores each document against the
//! question but never filters the set: it only makes the aggregate
//! answer/refuse decision.

use std::sync::Arc;

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::models::Document;
use crate::similarity::cosine_similarity;

/// Default minimum best-document similarity required to answer.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.7;

#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Retrieval returned no documents.
    Empty,
    /// Every document scored below the threshold.
    LowConfidence { best_score: f32 },
    /// At least one document reached the threshold.
    Confident { best_score: f32 },
}

pub struct ConfidenceGate {
    embedder: Arc<dyn EmbeddingProvider>,
    threshold: f32,
}

impl ConfidenceGate {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, threshold: f32) -> Self {
        Self {
            embedder,
            threshold,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Cosine similarity between `question` and each document's content,
    /// in document order.
    pub async fn score(&self, question: &str, docs: &[Document]) -> Result<Vec<f32>> {
        if docs.is_empty() {
            return Ok(Vec::new());
        }
        let question_vec = self.embedder.embed(question).await?;
        let contents: Vec<String> = docs.iter().map(|d| d.page_content.clone()).collect();
        let doc_vecs = self.embedder.embed_batch(&contents).await?;

        doc_vecs
            .iter()
            .map(|v| cosine_similarity(&question_vec, v))
            .collect()
    }

    pub async fn evaluate(&self, question: &str, docs: &[Document]) -> Result<GateDecision> {
        if docs.is_empty() {
            return Ok(GateDecision::Empty);
        }
        let best_score = self
            .score(question, docs)
            .await?
            .into_iter()
            .fold(f32::NEG_INFINITY, f32::max);

        if best_score < self.threshold {
            Ok(GateDecision::LowConfidence { best_score })
        } else {
            Ok(GateDecision::Confident { best_score })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Questions embed to `[1, 0]`; documents embed to `[cos, sin]` where
    /// `cos` is parsed from the text, so the text *is* the score.
    struct ScoreProvider;

    #[async_trait]
    impl EmbeddingProvider for ScoreProvider {
        fn model_name(&self) -> &str {
            "score"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| match t.parse::<f32>() {
                    Ok(c) => vec![c, (1.0 - c * c).max(0.0).sqrt()],
                    Err(_) => vec![1.0, 0.0],
                })
                .collect())
        }
    }

    fn gate() -> ConfidenceGate {
        ConfidenceGate::new(Arc::new(ScoreProvider), DEFAULT_CONFIDENCE_THRESHOLD)
    }

    fn docs(scores: &[&str]) -> Vec<Document> {
        scores.iter().map(|s| Document::new(*s)).collect()
    }

    #[tokio::test]
    async fn no_documents_is_empty() {
        assert_eq!(gate().evaluate("q", &[]).await.unwrap(), GateDecision::Empty);
    }

    #[tokio::test]
    async fn all_below_threshold_is_low_confidence() {
        let decision = gate().evaluate("q", &docs(&["0.2", "0.65", "0.5"])).await.unwrap();
        match decision {
            GateDecision::LowConfidence { best_score } => {
                assert!((best_score - 0.65).abs() < 1e-4)
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn one_strong_document_is_enough() {
        let decision = gate().evaluate("q", &docs(&["0.1", "0.9", "0.3"])).await.unwrap();
        assert!(matches!(decision, GateDecision::Confident { .. }));
    }

    #[tokio::test]
    async fn scores_follow_document_order() {
        let scores = gate().score("q", &docs(&["0.3", "0.8"])).await.unwrap();
        assert!((scores[0] - 0.3).abs() < 1e-4);
        assert!((scores[1] - 0.8).abs() < 1e-4);
    }
}
