//! Anthropic chat model client
//!
//! Thin request/response adapter over the Messages API with support for
//! both synchronous and streaming responses.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use lattice_core::{AnthropicConfig, ChatModel, LatticeError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API client
pub struct AnthropicChatModel {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    kind: String,
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    text: Option<String>,
}

impl AnthropicChatModel {
    /// Create a new client
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.anthropic.com".to_string(),
            model: model.into(),
            max_tokens,
            temperature,
        }
    }

    /// Create from config
    pub fn from_config(config: &AnthropicConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_ref()
            .ok_or_else(|| LatticeError::Config("Anthropic API key required".to_string()))?;

        Ok(Self {
            client: Client::new(),
            api_key: api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Set custom base URL
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn request(&self, prompt: &str, stream: bool) -> MessagesRequest {
        MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: self.temperature,
            stream: stream.then_some(true),
        }
    }
}

/// Extract streamed text out of one SSE chunk
fn parse_sse_chunk(text: &str) -> String {
    let mut content = String::new();
    for line in text.lines() {
        if let Some(data) = line.strip_prefix("data: ") {
            if let Ok(event) = serde_json::from_str::<StreamEvent>(data) {
                if event.kind == "content_block_delta" {
                    if let Some(delta_text) = event.delta.and_then(|d| d.text) {
                        content.push_str(&delta_text);
                    }
                }
            }
        }
    }
    content
}

#[async_trait]
impl ChatModel for AnthropicChatModel {
    async fn call(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&self.request(prompt, false))
            .send()
            .await
            .map_err(|e| LatticeError::Model(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LatticeError::Model(format!("Anthropic error: {error_text}")));
        }

        let result: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LatticeError::Model(format!("Failed to parse response: {e}")))?;

        result
            .content
            .iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text.clone())
            .ok_or_else(|| LatticeError::Model("No text content generated".to_string()))
    }

    async fn stream(&self, prompt: &str) -> Result<BoxStream<'static, Result<String>>> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&self.request(prompt, true))
            .send()
            .await
            .map_err(|e| LatticeError::Model(format!("Stream request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LatticeError::Model(format!(
                "Anthropic stream error: {error_text}"
            )));
        }

        let stream = response.bytes_stream();

        let mapped_stream = stream.filter_map(|result| async move {
            match result {
                Ok(bytes) => {
                    let content = parse_sse_chunk(&String::from_utf8_lossy(&bytes));
                    if content.is_empty() {
                        None
                    } else {
                        Some(Ok(content))
                    }
                }
                Err(e) => Some(Err(LatticeError::Model(format!("Stream error: {e}")))),
            }
        });

        Ok(Box::pin(mapped_stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_creation() {
        let client = AnthropicChatModel::new("test-key", "claude-3-5-haiku-latest", 2048, 0.1);
        assert_eq!(client.model, "claude-3-5-haiku-latest");
        assert_eq!(client.base_url, "https://api.anthropic.com");
    }

    #[test]
    fn test_from_config_requires_api_key() {
        let config = AnthropicConfig::default();
        assert!(AnthropicChatModel::from_config(&config).is_err());
    }

    #[test]
    fn test_parse_sse_chunk() {
        let chunk = concat!(
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hello\"}}\n",
            "\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\" world\"}}\n",
        );
        assert_eq!(parse_sse_chunk(chunk), "Hello world");
    }

    #[test]
    fn test_parse_sse_chunk_ignores_other_events() {
        let chunk = concat!(
            "data: {\"type\":\"message_start\",\"message\":{}}\n",
            "data: {\"type\":\"message_stop\"}\n",
        );
        assert_eq!(parse_sse_chunk(chunk), "");
    }

    #[tokio::test]
    async fn test_call_returns_first_text_block() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "test-key")
            .match_header("anthropic-version", ANTHROPIC_VERSION)
            .with_status(200)
            .with_body(
                json!({
                    "content": [{ "type": "text", "text": "Hi there" }],
                    "model": "claude-3-5-haiku-latest",
                    "stop_reason": "end_turn",
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = AnthropicChatModel::new("test-key", "claude-3-5-haiku-latest", 256, 0.0)
            .with_base_url(server.url());

        let answer = client.call("hello").await.unwrap();
        assert_eq!(answer, "Hi there");
    }

    #[tokio::test]
    async fn test_call_surfaces_api_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(401)
            .with_body("{\"error\":{\"type\":\"authentication_error\"}}")
            .create_async()
            .await;

        let client = AnthropicChatModel::new("bad-key", "claude-3-5-haiku-latest", 256, 0.0)
            .with_base_url(server.url());

        let err = client.call("hello").await.unwrap_err();
        assert!(matches!(err, LatticeError::Model(_)));
    }
}
