//! Text generation client.
//!
//! [`ChatModel`] is the seam to the external generation service used by the
//! conversation responder and the enrichment job. [`OpenAiChat`] implements it
//! against any OpenAI-compatible `/chat/completions` endpoint.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::error::ProviderError;

/// A single chat message sent to the generation model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".into(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".into(), content: content.into() }
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Produce the assistant's next message for `messages`.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError>;
}

/// Run a completion bounded by `timeout`. A timeout is reported as
/// [`ProviderError::Timeout`], same as any other provider failure.
pub async fn complete_bounded(
    model: &dyn ChatModel,
    messages: &[ChatMessage],
    timeout: Duration,
) -> Result<String, ProviderError> {
    tokio::time::timeout(timeout, model.complete(messages))
        .await
        .map_err(|_| ProviderError::Timeout(timeout))?
}

pub struct OpenAiChat {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiChat {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NotConfigured(
                "no API key (set OPENAI_API_KEY or generation.api_key)".into(),
            ));
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&CompletionRequest {
                model: &self.model,
                messages,
                temperature: self.temperature,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CompletionResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::Malformed("completion had no content".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stalled;

    #[async_trait]
    impl ChatModel for Stalled {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, ProviderError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".into())
        }
    }

    #[tokio::test]
    async fn complete_bounded_times_out() {
        let err = complete_bounded(&Stalled, &[ChatMessage::user("oi")], Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let chat = OpenAiChat::new(&GenerationConfig::default()).unwrap();
        let err = chat.complete(&[ChatMessage::user("oi")]).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[test]
    fn completion_response_parses() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"Olá!"}}]}"#;
        let parsed: CompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("Olá!"));
    }
}
