//! Mistral moderation client
//!
//! Classifies text against the vendor's policy categories. Category
//! names are passed through as-is; the vendor extends the set without
//! notice.

use async_trait::async_trait;
use lattice_core::{
    LatticeError, MistralConfig, Moderation, ModerationModel, ModerationResult, Result,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Mistral moderations API client
pub struct MistralModerationModel {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ModerationRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ModerationResponse {
    id: String,
    model: String,
    results: Vec<ModerationResultWire>,
}

#[derive(Debug, Deserialize)]
struct ModerationResultWire {
    #[serde(default)]
    categories: HashMap<String, bool>,
    #[serde(default)]
    category_scores: HashMap<String, f32>,
}

impl MistralModerationModel {
    /// Create a new client
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.mistral.ai".to_string(),
            model: model.into(),
        }
    }

    /// Create from config
    pub fn from_config(config: &MistralConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_ref()
            .ok_or_else(|| LatticeError::Config("Mistral API key required".to_string()))?;

        Ok(Self::new(api_key.clone(), config.moderation_model.clone())
            .with_base_url(config.base_url.clone()))
    }

    /// Set custom base URL
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl ModerationModel for MistralModerationModel {
    async fn moderate(&self, input: &str) -> Result<Moderation> {
        let request = ModerationRequest {
            model: self.model.clone(),
            input: vec![input.to_string()],
        };

        let response = self
            .client
            .post(format!("{}/v1/moderations", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| LatticeError::Model(format!("Moderation request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LatticeError::Model(format!(
                "Mistral moderation error: {error_text}"
            )));
        }

        let result: ModerationResponse = response
            .json()
            .await
            .map_err(|e| LatticeError::Model(format!("Failed to parse moderation response: {e}")))?;

        Ok(Moderation {
            id: result.id,
            model: result.model,
            results: result
                .results
                .into_iter()
                .map(|r| ModerationResult {
                    categories: r.categories,
                    category_scores: r.category_scores,
                })
                .collect(),
        })
    }
}
