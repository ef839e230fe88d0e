//! Container provisioning
//!
//! Ensures the database and container exist with the vector index and
//! partition scheme the store needs, before any read or write. Safe to
//! run on every store construction.

use crate::client::{
    ContainerSpec, IndexPath, IndexingPolicy, PartitionKeyDefinition, PartitionKind,
    ProvisioningClient, VectorEmbedding, VectorEmbeddingPolicy, VectorIndexSpec,
};
use lattice_core::{CosmosConfig, Result};

/// Path of the embedding field inside a wire record
pub const EMBEDDING_PATH: &str = "/embedding";

/// Partition key path used when none is configured
pub const DEFAULT_PARTITION_KEY_PATH: &str = "/id";

/// Manual throughput used when none is configured
pub const DEFAULT_THROUGHPUT: u32 = 400;

/// Build the container definition from the store configuration
///
/// Indexing is consistent-mode with everything excluded except the
/// `metadata` and `content` subtrees, plus one diskANN vector index over
/// the embedding path.
pub fn container_spec(config: &CosmosConfig) -> ContainerSpec {
    let raw_paths = config
        .partition_key_path
        .as_deref()
        .unwrap_or(DEFAULT_PARTITION_KEY_PATH);

    let mut paths: Vec<String> = raw_paths
        .split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    if paths.is_empty() {
        paths.push(DEFAULT_PARTITION_KEY_PATH.to_string());
    }

    let kind = if paths.len() > 1 {
        PartitionKind::MultiHash
    } else {
        PartitionKind::Hash
    };

    let throughput = if config.throughput == 0 {
        DEFAULT_THROUGHPUT
    } else {
        config.throughput
    };

    ContainerSpec {
        name: config.container_name.clone(),
        partition_key: PartitionKeyDefinition {
            paths,
            kind,
            version: 2,
        },
        indexing_policy: IndexingPolicy {
            indexing_mode: "consistent".to_string(),
            excluded_paths: vec![IndexPath {
                path: "/*".to_string(),
            }],
            included_paths: vec![
                IndexPath {
                    path: "/metadata/?".to_string(),
                },
                IndexPath {
                    path: "/content/?".to_string(),
                },
            ],
            vector_indexes: vec![VectorIndexSpec {
                path: EMBEDDING_PATH.to_string(),
                index_type: "diskANN".to_string(),
            }],
        },
        vector_embedding_policy: VectorEmbeddingPolicy {
            vector_embeddings: vec![VectorEmbedding {
                path: EMBEDDING_PATH.to_string(),
                data_type: "float32".to_string(),
                dimensions: config.vector_dimensions,
                distance_function: "cosine".to_string(),
            }],
        },
        throughput,
    }
}

/// Ensure the database and container exist
///
/// Any failure here is unrecoverable at store-construction time and must
/// abort construction.
pub async fn ensure_container(
    client: &dyn ProvisioningClient,
    config: &CosmosConfig,
) -> Result<()> {
    client
        .create_database_if_not_exists(&config.database_name)
        .await?;

    client
        .create_container_if_not_exists(&config.database_name, &container_spec(config))
        .await?;

    tracing::info!(
        database = %config.database_name,
        container = %config.container_name,
        "container provisioned"
    );

    Ok(())
}
