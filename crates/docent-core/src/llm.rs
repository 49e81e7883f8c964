//! Chat model capability.
//!
//! The pipeline talks to a language model only through [`ChatModel`]. A
//! [`CompletionRequest`] carries the system instruction, the session
//! history, the user turn and an optional retrieved context block; how those
//! map onto a wire format is the implementation's business.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Message;

/// Placeholder in system prompts that receives the context block.
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub history: Vec<Message>,
    pub user_input: String,
    pub context: Option<String>,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, user_input: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            history: Vec::new(),
            user_input: user_input.into(),
            context: None,
        }
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The system instruction with the context block substituted for
    /// [`CONTEXT_PLACEHOLDER`], or appended when the prompt has none.
    pub fn system_message(&self) -> String {
        match &self.context {
            Some(ctx) if self.system_prompt.contains(CONTEXT_PLACEHOLDER) => {
                self.system_prompt.replace(CONTEXT_PLACEHOLDER, ctx)
            }
            Some(ctx) => format!("{}\n\nContext:\n{}", self.system_prompt, ctx),
            None => self.system_prompt.replace(CONTEXT_PLACEHOLDER, ""),
        }
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;

    /// Run one completion and return the assistant's text.
    ///
    /// Fails with [`Error::ModelInvocation`](crate::Error::ModelInvocation)
    /// on timeouts, rate limits, or malformed responses.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_replaces_placeholder() {
        let req = CompletionRequest::new("Use this:\n{context}\nBe brief.", "q")
            .with_context("DOCS");
        assert_eq!(req.system_message(), "Use this:\nDOCS\nBe brief.");
    }

    #[test]
    fn context_is_appended_without_placeholder() {
        let req = CompletionRequest::new("Be brief.", "q").with_context("DOCS");
        assert_eq!(req.system_message(), "Be brief.\n\nContext:\nDOCS");
    }

    #[test]
    fn no_context_leaves_prompt_clean() {
        let req = CompletionRequest::new("A {context}B", "q");
        assert_eq!(req.system_message(), "A B");
    }
}
