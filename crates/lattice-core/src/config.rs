//! Lattice Configuration Management
//!
//! Handles configuration from environment variables and config files
//! with sensible defaults for development. Vendor credentials are only
//! ever read from the environment.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Cosmos DB vector store
    pub cosmos: CosmosConfig,

    /// Chroma vector store
    pub chroma: ChromaConfig,

    /// Anthropic chat model
    pub anthropic: AnthropicConfig,

    /// Mistral chat/embedding/moderation models
    pub mistral: MistralConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Cosmos DB
        if let Ok(endpoint) = std::env::var("COSMOS_ENDPOINT") {
            config.cosmos.endpoint = endpoint;
        }
        if let Ok(key) = std::env::var("COSMOS_KEY") {
            config.cosmos.key = key;
        }
        if let Ok(database) = std::env::var("COSMOS_DATABASE") {
            config.cosmos.database_name = database;
        }
        if let Ok(container) = std::env::var("COSMOS_CONTAINER") {
            config.cosmos.container_name = container;
        }
        if let Ok(path) = std::env::var("COSMOS_PARTITION_KEY_PATH") {
            config.cosmos.partition_key_path = Some(path);
        }
        if let Ok(throughput) = std::env::var("COSMOS_THROUGHPUT") {
            config.cosmos.throughput =
                throughput.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "COSMOS_THROUGHPUT".to_string(),
                    value: throughput,
                })?;
        }
        if let Ok(dimensions) = std::env::var("COSMOS_VECTOR_DIMENSIONS") {
            config.cosmos.vector_dimensions =
                dimensions.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "COSMOS_VECTOR_DIMENSIONS".to_string(),
                    value: dimensions,
                })?;
        }

        // Chroma
        if let Ok(url) = std::env::var("CHROMA_URL") {
            config.chroma.url = url;
        }
        if let Ok(collection) = std::env::var("CHROMA_COLLECTION") {
            config.chroma.collection_name = collection;
        }
        if let Ok(token) = std::env::var("CHROMA_API_TOKEN") {
            config.chroma.api_token = Some(token);
        }

        // Anthropic
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            config.anthropic.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("ANTHROPIC_MODEL") {
            config.anthropic.model = model;
        }

        // Mistral
        if let Ok(key) = std::env::var("MISTRAL_API_KEY") {
            config.mistral.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("MISTRAL_CHAT_MODEL") {
            config.mistral.chat_model = model;
        }
        if let Ok(model) = std::env::var("MISTRAL_EMBEDDING_MODEL") {
            config.mistral.embedding_model = model;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.logging.level = level;
        }

        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence for secrets)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        let env_config = Self::from_env()?;

        if env_config.cosmos.key != CosmosConfig::default().key {
            self.cosmos.key = env_config.cosmos.key;
        }
        if env_config.anthropic.api_key.is_some() {
            self.anthropic.api_key = env_config.anthropic.api_key;
        }
        if env_config.mistral.api_key.is_some() {
            self.mistral.api_key = env_config.mistral.api_key;
        }
        if env_config.chroma.api_token.is_some() {
            self.chroma.api_token = env_config.chroma.api_token;
        }

        Ok(self)
    }
}

/// Cosmos DB vector store configuration
///
/// Established once at store construction and immutable for the store's
/// lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CosmosConfig {
    /// Account endpoint, e.g. https://myaccount.documents.azure.com
    pub endpoint: String,

    /// Base64-encoded master key
    pub key: String,

    /// Database name (created if absent)
    pub database_name: String,

    /// Container name (created if absent)
    pub container_name: String,

    /// Partition key path(s); comma-separated paths enable multi-level
    /// hash partitioning. Defaults to /id when unset.
    pub partition_key_path: Option<String>,

    /// Manual throughput in request units/sec; 0 means the 400 RU default
    pub throughput: u32,

    /// Vector dimensionality (must match the embedding model)
    pub vector_dimensions: u64,
}

impl Default for CosmosConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://localhost:8081".to_string(),
            key: String::new(),
            database_name: "lattice".to_string(),
            container_name: "documents".to_string(),
            partition_key_path: None,
            throughput: 0,
            vector_dimensions: 1024, // mistral-embed
        }
    }
}

/// Chroma vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChromaConfig {
    /// Server URL
    pub url: String,

    /// Collection name
    pub collection_name: String,

    /// Static API token for token-secured deployments
    pub api_token: Option<String>,

    /// Create the collection at store construction
    pub init_schema: bool,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_string(),
            collection_name: "lattice".to_string(),
            api_token: None,
            init_schema: true,
        }
    }
}

/// Anthropic chat model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    /// API key
    pub api_key: Option<String>,

    /// API base URL
    pub base_url: String,

    /// Model name
    pub model: String,

    /// Maximum tokens for completion
    pub max_tokens: u32,

    /// Temperature for generation
    pub temperature: f32,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-3-5-haiku-latest".to_string(),
            max_tokens: 2048,
            temperature: 0.1,
        }
    }
}

/// Mistral model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MistralConfig {
    /// API key
    pub api_key: Option<String>,

    /// API base URL
    pub base_url: String,

    /// Chat model name
    pub chat_model: String,

    /// Embedding model name
    pub embedding_model: String,

    /// Moderation model name
    pub moderation_model: String,

    /// Maximum tokens for completion
    pub max_tokens: u32,

    /// Temperature for generation
    pub temperature: f32,
}

impl Default for MistralConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.mistral.ai".to_string(),
            chat_model: "mistral-small-latest".to_string(),
            embedding_model: "mistral-embed".to_string(),
            moderation_model: "mistral-moderation-latest".to_string(),
            max_tokens: 2048,
            temperature: 0.1,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Install the global tracing subscriber from the logging configuration
///
/// `RUST_LOG` takes precedence over the configured level. Repeated
/// initialization keeps the first subscriber.
pub fn init_logging(config: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let _ = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.cosmos.vector_dimensions, 1024);
        assert_eq!(config.cosmos.throughput, 0);
        assert_eq!(config.chroma.url, "http://localhost:8000");
        assert_eq!(config.mistral.embedding_model, "mistral-embed");
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            [cosmos]
            endpoint = "https://acct.documents.azure.com"
            key = "secret"
            database_name = "testdb"
            container_name = "vectors"
            partition_key_path = "/id"
            throughput = 800
            vector_dimensions = 1536

            [chroma]
            url = "http://chroma:8000"
            collection_name = "TestCollection"
            init_schema = true

            [anthropic]
            base_url = "https://api.anthropic.com"
            model = "claude-3-5-haiku-latest"
            max_tokens = 1024
            temperature = 0.2

            [mistral]
            base_url = "https://api.mistral.ai"
            chat_model = "mistral-small-latest"
            embedding_model = "mistral-embed"
            moderation_model = "mistral-moderation-latest"
            max_tokens = 1024
            temperature = 0.2

            [logging]
            level = "debug"
            json_format = false
        "#;

        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.cosmos.database_name, "testdb");
        assert_eq!(config.cosmos.throughput, 800);
        assert_eq!(config.chroma.collection_name, "TestCollection");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_init_logging_is_repeat_safe() {
        let config = LoggingConfig::default();
        init_logging(&config);
        init_logging(&config);
    }
}
