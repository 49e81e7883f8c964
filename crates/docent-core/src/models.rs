//! Core data models that flow through the answering pipeline.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Author of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A question typed by the user.
    Human,
    /// An answer produced by the assistant.
    Ai,
}

/// One turn of a session's conversation. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: Role::Ai,
            content: content.into(),
        }
    }

    pub fn is_human(&self) -> bool {
        self.role == Role::Human
    }
}

/// A retrieved knowledge-base unit.
///
/// `metadata` is free-form JSON; the only key the pipeline relies on is
/// `url`, used for citations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.set_url(url);
        self
    }

    /// The citation URL, if present and non-empty.
    pub fn url(&self) -> Option<&str> {
        self.metadata
            .get("url")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.metadata
            .insert("url".to_string(), Value::String(url.into()));
    }
}
