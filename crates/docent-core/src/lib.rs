//! # Docent Core
//!
//! Runtime-agnostic logic for Docent: data models, cosine similarity,
//! the embedding cache, the store and model traits, and the grounded
//! answering pipeline.
//!
//! This crate contains no tokio, sqlx, HTTP client, or filesystem I/O.
//! Concrete providers (OpenAI, Ollama, SQLite) live in the `docent` app
//! crate and plug in through the traits defined here.
//!
//! ## Pipeline
//!
//! ```text
//!  question ──▶ DuplicateQuestionGuard ──▶ VectorStore::search ──▶ ConfidenceGate
//!                     │ duplicate                                      │ empty / low
//!                     ▼                                                ▼
//!               advisory text                                    advisory text
//!                                                                      │ confident
//!                                                                      ▼
//!                                  HistoryStore ◀── ConversationalAnswerer ──▶ ChatModel
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | `Message`, `Role`, `Document` |
//! | [`error`] | Error taxonomy shared by every component |
//! | [`similarity`] | Cosine similarity |
//! | [`embedding`] | `EmbeddingProvider` trait and the LRU embedding cache |
//! | [`store`] | `VectorStore` trait and an in-memory implementation |
//! | [`history`] | `HistoryStore` trait and a bounded in-memory implementation |
//! | [`llm`] | `ChatModel` trait and the completion request shape |
//! | [`document`] | Reference-URL extraction, fallback URLs, context formatting |
//! | [`prompts`] | Fixed system instructions and advisory texts |
//! | [`guard`] | Duplicate question detection |
//! | [`gate`] | Retrieval confidence gate |
//! | [`answerer`] | History-aware retrieval and grounded answering |
//! | [`pipeline`] | End-to-end question handling |

pub mod answerer;
pub mod document;
pub mod embedding;
pub mod error;
pub mod gate;
pub mod guard;
pub mod history;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod similarity;
pub mod store;

pub use error::{Error, Result};
pub use models::{Document, Message, Role};
pub use pipeline::{Outcome, Pipeline, PipelineSettings};
