//! Lattice Models - Vendor model adapters
//!
//! Thin request/response clients for the Anthropic and Mistral APIs
//! behind the shared `ChatModel`, `EmbeddingModel`, and `ModerationModel`
//! traits, plus config-driven factory functions that wire the right
//! client from application configuration.

pub mod anthropic;
pub mod mistral;
pub mod moderation;

pub use anthropic::AnthropicChatModel;
pub use mistral::{MistralChatModel, MistralEmbeddingModel};
pub use moderation::MistralModerationModel;

use lattice_core::{
    AppConfig, ChatModel, EmbeddingModel, LatticeError, MistralConfig, ModerationModel, Result,
};

/// Supported chat model vendors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatProvider {
    Anthropic,
    Mistral,
}

impl std::str::FromStr for ChatProvider {
    type Err = LatticeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "mistral" => Ok(Self::Mistral),
            other => Err(LatticeError::Config(format!(
                "unknown chat provider: {other}"
            ))),
        }
    }
}

/// Create a chat model client from config
pub fn create_chat_model(
    config: &AppConfig,
    provider: ChatProvider,
) -> Result<Box<dyn ChatModel>> {
    tracing::debug!(?provider, "creating chat model client");
    match provider {
        ChatProvider::Anthropic => Ok(Box::new(AnthropicChatModel::from_config(
            &config.anthropic,
        )?)),
        ChatProvider::Mistral => Ok(Box::new(MistralChatModel::from_config(&config.mistral)?)),
    }
}

/// Create an embedding model client from config
pub fn create_embedding_model(config: &MistralConfig) -> Result<Box<dyn EmbeddingModel>> {
    Ok(Box::new(MistralEmbeddingModel::from_config(config)?))
}

/// Create a moderation model client from config
pub fn create_moderation_model(config: &MistralConfig) -> Result<Box<dyn ModerationModel>> {
    Ok(Box::new(MistralModerationModel::from_config(config)?))
}
