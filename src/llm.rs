//! Chat model backends.
//!
//! [`OpenAiChatModel`] speaks the OpenAI-compatible
//! `POST {url}/v1/chat/completions` protocol, which OpenAI, Ollama and
//! LM Studio all serve. The system message carries the rendered prompt with
//! its context block; session history follows as `user` / `assistant`
//! turns, then the new question.
//!
//! Requests are sent once. Timeouts, non-2xx statuses and malformed bodies
//! all become [`Error::ModelInvocation`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use docent_core::llm::{ChatModel, CompletionRequest};
use docent_core::{Error, Role};

use crate::config::LlmConfig;

#[derive(Debug, Clone, Serialize, PartialEq)]
struct WireMessage {
    role: &'static str,
    content: String,
}

/// Flatten a request into the chat-completions `messages` array.
fn wire_messages(request: &CompletionRequest) -> Vec<WireMessage> {
    let mut messages = Vec::with_capacity(request.history.len() + 2);
    messages.push(WireMessage {
        role: "system",
        content: request.system_message(),
    });
    for message in &request.history {
        let role = match message.role {
            Role::Human => "user",
            Role::Ai => "assistant",
        };
        messages.push(WireMessage {
            role,
            content: message.content.clone(),
        });
    }
    messages.push(WireMessage {
        role: "user",
        content: request.user_input.clone(),
    });
    messages
}

fn parse_completion(payload: &Value) -> Result<String, Error> {
    payload["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::model("chat response missing choices[0].message.content"))
}

pub struct OpenAiChatModel {
    model: String,
    base_url: String,
    api_key: Option<String>,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiChatModel {
    /// Build from `[llm]`. The API key is read from `api_key_env`; it is
    /// required for the `openai` provider and optional otherwise.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.is_empty());
        if config.provider == "openai" && api_key.is_none() {
            bail!("{} environment variable not set", config.api_key_env);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            base_url: config.base_url(),
            api_key,
            temperature: config.temperature,
            client,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> docent_core::Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": wire_messages(&request),
            "temperature": self.temperature,
            "stream": false,
        });

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let res = builder
            .send()
            .await
            .map_err(|e| Error::model(format!("chat request to {} failed: {}", url, e)))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(Error::model(format!("chat API error {}: {}", status, text)));
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|e| Error::model(format!("invalid chat response: {}", e)))?;
        parse_completion(&payload)
    }
}

/// Stand-in used when `llm.provider = "disabled"`; every call fails.
pub struct DisabledModel;

#[async_trait]
impl ChatModel for DisabledModel {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _request: CompletionRequest) -> docent_core::Result<String> {
        Err(Error::model(
            "Chat model is disabled; set [llm].provider in the config",
        ))
    }
}

pub fn create_chat_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledModel)),
        "openai" | "ollama" => Ok(Arc::new(OpenAiChatModel::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}
