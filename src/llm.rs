//! Language-model client.
//!
//! [`ChatModel`] is the seam the orchestrator calls through; the only
//! production implementation speaks the OpenAI-compatible
//! `POST /chat/completions` protocol (OpenAI, Azure-style gateways, Ollama's
//! `/v1`, vLLM, ...). Calls are never retried: a failure surfaces to the
//! caller as [`DocChatError::LlmCall`].

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{DocChatError, Result};
use crate::models::Role;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A single completion request: system instruction plus one or more messages.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub model: String,
    pub temperature: f32,
}

impl ChatRequest {
    /// The wire message list: system instruction first, then `messages`.
    pub fn wire_messages(&self) -> Vec<Message> {
        let mut out = Vec::with_capacity(self.messages.len() + 1);
        out.push(Message::new(Role::System, self.system.clone()));
        out.extend(self.messages.iter().cloned());
        out
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Returns the text of the first completion choice.
    async fn complete(&self, request: &ChatRequest) -> Result<String>;
}

/// OpenAI-compatible chat completions client.
pub struct OpenAiChatModel {
    endpoint: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiChatModel {
    pub fn new(config: &LlmConfig, api_key: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            endpoint: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            client,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.endpoint);

        let body = serde_json::json!({
            "model": request.model,
            "messages": request.wire_messages(),
            "temperature": request.temperature,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DocChatError::LlmCall(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DocChatError::LlmCall(format!(
                "LLM returned {}: {}",
                status, text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DocChatError::LlmCall(e.to_string()))?;

        parse_completion(&json)
    }
}

/// Extracts `choices[0].message.content`.
fn parse_completion(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| DocChatError::LlmCall("LLM returned empty response".to_string()))
}

/// Builds the configured chat model.
///
/// Fails early when the API key environment variable is missing, before any
/// document is loaded.
pub fn create_chat_model(config: &LlmConfig) -> anyhow::Result<Box<dyn ChatModel>> {
    match config.provider.as_str() {
        "openai" => {
            let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                anyhow::anyhow!(
                    "{} environment variable not set; an API key is required to chat",
                    config.api_key_env
                )
            })?;
            Ok(Box::new(OpenAiChatModel::new(config, api_key)?))
        }
        other => anyhow::bail!("Unknown llm provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_message_goes_first() {
        let req = ChatRequest {
            system: "sys".to_string(),
            messages: vec![Message::new(Role::User, "hello")],
            model: "m".to_string(),
            temperature: 0.0,
        };
        let wire = req.wire_messages();
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[0], Message::new(Role::System, "sys"));
        assert_eq!(wire[1], Message::new(Role::User, "hello"));
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json[0]["role"], "system");
        assert_eq!(json[1]["role"], "user");
    }

    #[test]
    fn parses_first_choice() {
        let json = serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "first" } },
                { "message": { "role": "assistant", "content": "second" } }
            ]
        });
        assert_eq!(parse_completion(&json).unwrap(), "first");
    }

    #[test]
    fn empty_choices_is_llm_error() {
        let json = serde_json::json!({ "choices": [] });
        assert!(matches!(
            parse_completion(&json),
            Err(DocChatError::LlmCall(_))
        ));
    }

    #[test]
    fn missing_api_key_fails_early() {
        let config = LlmConfig {
            api_key_env: "DOCCHAT_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..LlmConfig::default()
        };
        let err = create_chat_model(&config).err().unwrap();
        assert!(err.to_string().contains("DOCCHAT_TEST_KEY_THAT_IS_NEVER_SET"));
    }
}
