//! # Docent
//!
//! A documentation assistant. Docent answers product questions from a
//! knowledge base of embedded documentation chunks, refuses to repeat
//! itself on near-duplicate questions, and declines to answer when
//! retrieval finds nothing relevant enough.
//!
//! The answering logic lives in [`docent_core`]; this crate supplies the
//! production backends and the outer surfaces.
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────────────┐   ┌──────────┐
//! │  import  │──▶│  SQLite kb_documents (BLOBs)  │◀──│ Pipeline │
//! │  JSONL   │   └──────────────────────────────┘   └────┬─────┘
//! └──────────┘                                          │
//!                                     ┌─────────────────┤
//!                                     ▼                 ▼
//!                                ┌──────────┐     ┌──────────┐
//!                                │   CLI    │     │   HTTP   │
//!                                │ ask/chat │     │  /ask    │
//!                                └──────────┘     └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docent init
//! docent import ./docs.jsonl
//! docent ask "How do I add a widget?"
//! docent serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`logging`] | Tracing subscriber setup |
//! | [`db`] | SQLite connection with startup retry |
//! | [`migrate`] | Schema migrations |
//! | [`embedding`] | OpenAI / Ollama embedding providers |
//! | [`llm`] | OpenAI-compatible chat model |
//! | [`sqlite_store`] | SQLite vector store |
//! | [`import`] | JSONL knowledge-base import |
//! | [`session`] | Per-session locks |
//! | [`assistant`] | Pipeline wiring |
//! | [`server`] | HTTP API |
//! | [`stats`] | Knowledge-base statistics |

pub mod assistant;
pub mod config;
pub mod db;
pub mod embedding;
pub mod import;
pub mod llm;
pub mod logging;
pub mod migrate;
pub mod server;
pub mod session;
pub mod sqlite_store;
pub mod stats;
