//! Lattice Cosmos - Azure Cosmos DB vector store
//!
//! Orchestration layer over the remote document store's native vector
//! indexing: container provisioning, the embedding pipeline, bulk write
//! correlation, and filtered nearest-neighbor queries. Consistency and
//! ranking are delegated to the remote store; this layer holds no mutable
//! shared state beyond the client handle and configuration.

pub mod bulk;
pub mod client;
pub mod filter;
pub mod mapper;
pub mod provision;
pub mod query;
pub mod rest;

pub use client::{
    BulkOperation, BulkOutcome, BulkWriter, ContainerSpec, PagedQueryRunner, PartitionKind,
    ProvisioningClient, QueryPage, SqlParameter, SqlQuery,
};
pub use query::MAX_TOP_K;
pub use rest::CosmosRestClient;

use bulk::BulkBatch;
use lattice_core::{
    CosmosConfig, Document, EmbeddingModel, LatticeError, Result, SearchRequest, VectorStore,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Vector store backed by a Cosmos DB container
///
/// Construction provisions the database and container (create-if-absent)
/// and fails fast if provisioning fails; a store with a missing or
/// misconfigured container must not silently proceed.
pub struct CosmosVectorStore {
    config: CosmosConfig,
    embedding_model: Arc<dyn EmbeddingModel>,
    writer: Arc<dyn BulkWriter>,
    runner: Arc<dyn PagedQueryRunner>,
    closed: AtomicBool,
}

impl CosmosVectorStore {
    /// Connect with the REST transport and provision the container
    pub async fn new(
        config: CosmosConfig,
        embedding_model: Arc<dyn EmbeddingModel>,
    ) -> Result<Self> {
        let client = Arc::new(CosmosRestClient::new(&config.endpoint, &config.key)?);
        Self::with_clients(config, embedding_model, client.clone(), client.clone(), client).await
    }

    /// Construct against injected capability clients
    ///
    /// This is the seam the tests use: any fake implementing the three
    /// capability traits stands in for the remote store.
    pub async fn with_clients(
        config: CosmosConfig,
        embedding_model: Arc<dyn EmbeddingModel>,
        provisioning: Arc<dyn ProvisioningClient>,
        writer: Arc<dyn BulkWriter>,
        runner: Arc<dyn PagedQueryRunner>,
    ) -> Result<Self> {
        provision::ensure_container(provisioning.as_ref(), &config).await?;

        Ok(Self {
            config,
            embedding_model,
            writer,
            runner,
            closed: AtomicBool::new(false),
        })
    }

    /// Release the store; subsequent operations fail
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        info!("Cosmos DB client closed");
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LatticeError::Store("client closed".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl VectorStore for CosmosVectorStore {
    async fn add(&self, documents: Vec<Document>) -> Result<()> {
        self.ensure_open()?;

        // Embedding failure is opaque and fatal to the whole call
        let mut records = Vec::with_capacity(documents.len());
        for document in &documents {
            let embedding = self.embedding_model.embed(&document.content).await?;
            records.push((
                document.id.clone(),
                mapper::to_wire_record(document, &embedding),
            ));
        }

        let batch = BulkBatch::creates(records);
        bulk::execute_creates(
            self.writer.as_ref(),
            &self.config.database_name,
            &self.config.container_name,
            &batch,
        )
        .await
    }

    async fn delete(&self, ids: Vec<String>) -> Result<()> {
        self.ensure_open()?;

        bulk::execute_deletes(
            self.writer.as_ref(),
            &self.config.database_name,
            &self.config.container_name,
            ids,
        )
        .await
    }

    async fn similarity_search(&self, request: &SearchRequest) -> Result<Vec<Document>> {
        self.ensure_open()?;
        query::validate_top_k(request.top_k)?;

        let embedding = self.embedding_model.embed(&request.query).await?;
        let sql = query::build_query(
            &embedding,
            request.top_k,
            request.similarity_threshold,
            request.filter.as_ref(),
        );

        query::run(
            self.runner.as_ref(),
            &self.config.database_name,
            &self.config.container_name,
            &sql,
        )
        .await
    }

    fn name(&self) -> &str {
        "cosmosdb"
    }
}
