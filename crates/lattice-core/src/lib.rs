//! Lattice Core - Domain types, traits, and shared infrastructure
//!
//! This crate defines the abstractions shared by every vendor integration:
//! - Document and search request models
//! - Metadata filter expressions
//! - Common traits (vector store, chat, embedding, moderation)
//! - Common error types
//! - Configuration management

pub mod config;
pub mod filter;

pub use config::{
    init_logging, AnthropicConfig, AppConfig, ChromaConfig, ConfigError, CosmosConfig,
    LoggingConfig, MistralConfig,
};
pub use filter::FilterExpression;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for Lattice operations
#[derive(Error, Debug)]
pub enum LatticeError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Provisioning failed: {0}")]
    Provisioning(String),

    #[error("Duplicate document id: {id}")]
    DuplicateId { id: String },

    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Search failed: {0}")]
    Search(String),

    #[error("Store operation failed: {0}")]
    Store(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, LatticeError>;

// ============================================================================
// Document Model
// ============================================================================

/// A document handed to a vector store
///
/// Immutable once passed to a store API: stores serialize it into their
/// wire representation but never mutate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier, caller-assigned or generated at construction
    pub id: String,

    /// Text content to be embedded and indexed
    pub content: String,

    /// Arbitrary metadata, filterable at query time
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Document {
    /// Create a document with a freshly generated id
    pub fn new(
        content: impl Into<String>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            metadata,
        }
    }

    /// Create a document with a caller-assigned id
    pub fn with_id(
        id: impl Into<String>,
        content: impl Into<String>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata,
        }
    }
}

// ============================================================================
// Search Request
// ============================================================================

/// Default number of results returned by a similarity search
pub const DEFAULT_TOP_K: usize = 4;

/// Threshold that accepts every result regardless of similarity
pub const SIMILARITY_THRESHOLD_ACCEPT_ALL: f32 = 0.0;

/// A similarity search request
///
/// The similarity convention follows the stores: a larger distance-function
/// value means more similar, and `similarity_threshold` is a lower bound.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Query text, embedded before execution
    pub query: String,

    /// Maximum number of results to return
    pub top_k: usize,

    /// Minimum similarity for a result to be included
    pub similarity_threshold: f32,

    /// Optional metadata filter
    pub filter: Option<FilterExpression>,
}

impl SearchRequest {
    /// Create a request with default top-k and an accept-all threshold
    pub fn query(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: DEFAULT_TOP_K,
            similarity_threshold: SIMILARITY_THRESHOLD_ACCEPT_ALL,
            filter: None,
        }
    }

    /// Set top-k
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the similarity threshold
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Accept every result regardless of similarity
    pub fn with_similarity_threshold_all(mut self) -> Self {
        self.similarity_threshold = SIMILARITY_THRESHOLD_ACCEPT_ALL;
        self
    }

    /// Set the metadata filter
    pub fn with_filter(mut self, filter: FilterExpression) -> Self {
        self.filter = Some(filter);
        self
    }
}

// ============================================================================
// Moderation Models
// ============================================================================

/// Result of a moderation call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Moderation {
    /// Vendor-assigned identifier for the call
    pub id: String,

    /// Model that produced the classification
    pub model: String,

    /// One entry per moderated input
    pub results: Vec<ModerationResult>,
}

/// Per-input moderation classification
///
/// Categories are kept as maps rather than fixed fields: vendors add and
/// rename categories without notice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationResult {
    /// Category name to violation verdict
    pub categories: HashMap<String, bool>,

    /// Category name to confidence score
    pub category_scores: HashMap<String, f32>,
}

impl ModerationResult {
    /// True if any category was flagged
    pub fn flagged(&self) -> bool {
        self.categories.values().any(|v| *v)
    }

    /// Verdict for a single category, false if the vendor did not report it
    pub fn category(&self, name: &str) -> bool {
        self.categories.get(name).copied().unwrap_or(false)
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Trait for vector similarity stores
///
/// `delete` and `similarity_search` return `Result` so callers can tell
/// "no matches" apart from "the call failed".
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Embed and write a batch of documents
    async fn add(&self, documents: Vec<Document>) -> Result<()>;

    /// Delete documents by id, blocking until the remote store has drained
    /// every per-item response
    async fn delete(&self, ids: Vec<String>) -> Result<()>;

    /// Nearest-neighbor search, ranked most-similar first
    async fn similarity_search(&self, request: &SearchRequest) -> Result<Vec<Document>>;

    /// Store name for logging
    fn name(&self) -> &str;
}

/// Trait for chat/completion model clients
#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a response
    async fn call(&self, prompt: &str) -> Result<String>;

    /// Generate a streaming response
    async fn stream(
        &self,
        prompt: &str,
    ) -> Result<futures::stream::BoxStream<'static, Result<String>>>;
}

/// Trait for moderation model clients
#[async_trait::async_trait]
pub trait ModerationModel: Send + Sync {
    /// Classify a single input
    async fn moderate(&self, input: &str) -> Result<Moderation>;
}

/// Trait for embedding model clients
#[async_trait::async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embedding dimensionality
    fn dimensions(&self) -> usize;
}

// ============================================================================
// Tests
// ============================================================================
