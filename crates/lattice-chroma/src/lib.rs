//! Lattice Chroma - Chroma vector store
//!
//! Adapter over the Chroma HTTP API: collection provisioning, the
//! embedding pipeline, and filtered nearest-neighbor queries. Chroma
//! reports cosine distance (smaller is closer); the adapter converts to
//! the shared similarity convention (larger is more similar) before
//! applying the request threshold.

pub mod api;
pub mod filter;

pub use api::{ChromaApi, Collection};

use api::{AddRequest, QueryRequest};
use lattice_core::{
    ChromaConfig, Document, EmbeddingModel, Result, SearchRequest, VectorStore,
};
use std::sync::Arc;
use tracing::info;

/// Vector store backed by a Chroma collection
pub struct ChromaVectorStore {
    api: ChromaApi,
    collection_id: String,
    collection_name: String,
    embedding_model: Arc<dyn EmbeddingModel>,
}

impl ChromaVectorStore {
    /// Connect and (optionally) create the collection
    pub async fn new(
        config: ChromaConfig,
        embedding_model: Arc<dyn EmbeddingModel>,
    ) -> Result<Self> {
        let mut api = ChromaApi::new(&config.url);
        if let Some(token) = &config.api_token {
            api = api.with_key_token(token);
        }

        let collection = if config.init_schema {
            api.get_or_create_collection(&config.collection_name).await?
        } else {
            api.get_collection(&config.collection_name).await?
        };

        info!(collection = %collection.name, "Chroma collection ready");

        Ok(Self {
            api,
            collection_id: collection.id,
            collection_name: collection.name,
            embedding_model,
        })
    }

    /// Name of the backing collection
    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }
}

#[async_trait::async_trait]
impl VectorStore for ChromaVectorStore {
    async fn add(&self, documents: Vec<Document>) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let contents: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let embeddings = self.embedding_model.embed_batch(&contents).await?;

        let request = AddRequest {
            ids: documents.iter().map(|d| d.id.clone()).collect(),
            embeddings,
            metadatas: documents.iter().map(|d| d.metadata.clone()).collect(),
            documents: contents,
        };

        self.api.add(&self.collection_id, &request).await
    }

    async fn delete(&self, ids: Vec<String>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.api.delete(&self.collection_id, ids).await
    }

    async fn similarity_search(&self, request: &SearchRequest) -> Result<Vec<Document>> {
        let embedding = self.embedding_model.embed(&request.query).await?;

        let query = QueryRequest {
            query_embeddings: vec![embedding],
            n_results: request.top_k,
            where_clause: request.filter.as_ref().map(filter::compile),
            include: vec![
                "documents".to_string(),
                "metadatas".to_string(),
                "distances".to_string(),
            ],
        };

        let response = self.api.query(&self.collection_id, &query).await?;

        // Results come back grouped per query embedding; we sent one
        let ids = response.ids.into_iter().next().unwrap_or_default();
        let mut contents = response
            .documents
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter();
        let mut metadatas = response
            .metadatas
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter();
        let mut distances = response
            .distances
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter();

        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let content = contents.next().flatten().unwrap_or_default();
            let metadata = metadatas.next().flatten().unwrap_or_default();
            let distance = distances.next().unwrap_or(0.0);

            // Cosine distance to similarity
            let similarity = 1.0 - distance;
            if similarity >= request.similarity_threshold {
                results.push(Document::with_id(id, content, metadata));
            }
        }

        Ok(results)
    }

    fn name(&self) -> &str {
        "chroma"
    }
}
