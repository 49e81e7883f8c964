//! Error taxonomy for the answering pipeline.
//!
//! Upstream failures (embedding, retrieval, model invocation) are carried
//! as errors and propagate to the caller untouched. Duplicate questions,
//! an empty knowledge base and low retrieval confidence are *not* errors:
//! they are [`Outcome`](crate::pipeline::Outcome) variants.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Two vectors of different length were compared.
    #[error("vector dimension mismatch: {left} != {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("embedding provider error: {0}")]
    EmbeddingProvider(String),

    #[error("model invocation error: {0}")]
    ModelInvocation(String),

    /// The answerer could not produce an answer. History is left untouched.
    #[error("answer generation failed: {0}")]
    AnswerGenerationFailed(#[source] Box<Error>),

    #[error("vector store error: {0}")]
    VectorStore(String),

    #[error("history store error: {0}")]
    History(String),
}

impl Error {
    pub fn embedding<E: std::fmt::Display>(err: E) -> Self {
        Error::EmbeddingProvider(err.to_string())
    }

    pub fn model<E: std::fmt::Display>(err: E) -> Self {
        Error::ModelInvocation(err.to_string())
    }

    pub fn vector_store<E: std::fmt::Display>(err: E) -> Self {
        Error::VectorStore(err.to_string())
    }

    /// Returns `true` for failures caused by an upstream service rather
    /// than by inconsistent local data.
    pub fn is_upstream(&self) -> bool {
        match self {
            Error::EmbeddingProvider(_) | Error::ModelInvocation(_) | Error::VectorStore(_) => {
                true
            }
            Error::AnswerGenerationFailed(inner) => inner.is_upstream(),
            Error::DimensionMismatch { .. } | Error::History(_) => false,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
