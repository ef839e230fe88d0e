//! Mistral chat and embedding clients
//!
//! Thin adapters over the chat completions and embeddings APIs with
//! support for both synchronous and streaming chat responses.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use lattice_core::{ChatModel, EmbeddingModel, LatticeError, MistralConfig, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

// ============================================================================
// Chat Client
// ============================================================================

/// Mistral chat completions client
pub struct MistralChatModel {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
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
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Choice {
    message: Message,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct StreamChoice {
    delta: Delta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    choices: Vec<StreamChoice>,
}

impl MistralChatModel {
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
            base_url: "https://api.mistral.ai".to_string(),
            model: model.into(),
            max_tokens,
            temperature,
        }
    }

    /// Create from config
    pub fn from_config(config: &MistralConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_ref()
            .ok_or_else(|| LatticeError::Config("Mistral API key required".to_string()))?;

        Ok(Self {
            client: Client::new(),
            api_key: api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.chat_model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Set custom base URL
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn request(&self, prompt: &str, stream: bool) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: self.max_tokens,
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
            if data == "[DONE]" {
                continue;
            }
            if let Ok(parsed) = serde_json::from_str::<StreamResponse>(data) {
                if let Some(choice) = parsed.choices.first() {
                    if let Some(c) = &choice.delta.content {
                        content.push_str(c);
                    }
                }
            }
        }
    }
    content
}

#[async_trait]
impl ChatModel for MistralChatModel {
    async fn call(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&self.request(prompt, false))
            .send()
            .await
            .map_err(|e| LatticeError::Model(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LatticeError::Model(format!("Mistral error: {error_text}")));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| LatticeError::Model(format!("Failed to parse response: {e}")))?;

        result
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| LatticeError::Model("No response generated".to_string()))
    }

    async fn stream(&self, prompt: &str) -> Result<BoxStream<'static, Result<String>>> {
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&self.request(prompt, true))
            .send()
            .await
            .map_err(|e| LatticeError::Model(format!("Stream request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LatticeError::Model(format!(
                "Mistral stream error: {error_text}"
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

// ============================================================================
// Embedding Client
// ============================================================================

/// Mistral embeddings client
pub struct MistralEmbeddingModel {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl MistralEmbeddingModel {
    /// Create a new client
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        let dimensions = match model.as_str() {
            "mistral-embed" => 1024,
            _ => 1024, // Default
        };

        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.mistral.ai".to_string(),
            model,
            dimensions,
        }
    }

    /// Create from config
    pub fn from_config(config: &MistralConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_ref()
            .ok_or_else(|| LatticeError::Config("Mistral API key required".to_string()))?;

        Ok(Self::new(api_key.clone(), config.embedding_model.clone())
            .with_base_url(config.base_url.clone()))
    }

    /// Set custom base URL
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl EmbeddingModel for MistralEmbeddingModel {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| LatticeError::Model("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
        };

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| LatticeError::Model(format!("Embedding request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LatticeError::Model(format!(
                "Mistral embedding error: {error_text}"
            )));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| LatticeError::Model(format!("Failed to parse embedding response: {e}")))?;

        // Sort by index and extract embeddings
        let mut embeddings: Vec<_> = result.data.into_iter().collect();
        embeddings.sort_by_key(|e| e.index);

        Ok(embeddings.into_iter().map(|e| e.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ============================================================================
// Tests
// ============================================================================
