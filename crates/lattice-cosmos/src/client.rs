//! Remote store capability contracts
//!
//! The orchestration layer talks to Cosmos DB only through these three
//! narrow interfaces, so every piece of store logic is testable against
//! in-memory fakes. The wire types double as the REST request bodies.

use async_trait::async_trait;
use lattice_core::Result;
use serde::{Deserialize, Serialize};

// ============================================================================
// Provisioning types
// ============================================================================

/// Partition scheme for a container
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionKeyDefinition {
    /// Ordered partition key paths
    pub paths: Vec<String>,

    /// Hash for a single path, MultiHash for hierarchical keys
    pub kind: PartitionKind,

    /// Partition key definition version
    pub version: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionKind {
    Hash,
    MultiHash,
}

/// A single indexed or excluded path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexPath {
    pub path: String,
}

/// Vector index declaration inside an indexing policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndexSpec {
    pub path: String,

    #[serde(rename = "type")]
    pub index_type: String,
}

/// Container indexing policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingPolicy {
    pub indexing_mode: String,
    pub excluded_paths: Vec<IndexPath>,
    pub included_paths: Vec<IndexPath>,
    pub vector_indexes: Vec<VectorIndexSpec>,
}

/// A single vector embedding declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorEmbedding {
    pub path: String,
    pub data_type: String,
    pub dimensions: u64,
    pub distance_function: String,
}

/// Container-level vector embedding policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorEmbeddingPolicy {
    pub vector_embeddings: Vec<VectorEmbedding>,
}

/// Everything needed to create a container
///
/// Serializes directly into the create-container request body; the
/// throughput travels in a request header, not the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    #[serde(rename = "id")]
    pub name: String,

    pub partition_key: PartitionKeyDefinition,

    pub indexing_policy: IndexingPolicy,

    pub vector_embedding_policy: VectorEmbeddingPolicy,

    #[serde(skip)]
    pub throughput: u32,
}

// ============================================================================
// Bulk write types
// ============================================================================

/// A single sub-operation of a bulk request
///
/// The partition key of both variants is the document id.
#[derive(Debug, Clone)]
pub enum BulkOperation {
    Create { id: String, body: serde_json::Value },
    Delete { id: String },
}

impl BulkOperation {
    /// Partition key / document id of this operation
    pub fn id(&self) -> &str {
        match self {
            Self::Create { id, .. } => id,
            Self::Delete { id } => id,
        }
    }
}

/// Per-item result of a bulk request
///
/// `operation` references the submitted operation by index: the bulk
/// engine does not carry the caller's logical key, and outcomes may
/// arrive in any order.
#[derive(Debug, Clone)]
pub struct BulkOutcome {
    pub operation: usize,

    /// HTTP-style status of the item, absent when the engine produced a
    /// response with no item information
    pub status: Option<u16>,
}

// ============================================================================
// Query types
// ============================================================================

/// A parameterized query
#[derive(Debug, Clone, Serialize)]
pub struct SqlQuery {
    pub query: String,
    pub parameters: Vec<SqlParameter>,
}

/// A bound query parameter
#[derive(Debug, Clone, Serialize)]
pub struct SqlParameter {
    pub name: String,
    pub value: serde_json::Value,
}

impl SqlParameter {
    pub fn new(name: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl SqlQuery {
    /// Look up a bound parameter by name
    pub fn parameter(&self, name: &str) -> Option<&serde_json::Value> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }
}

/// One page of query results
#[derive(Debug, Clone, Default)]
pub struct QueryPage {
    pub documents: Vec<serde_json::Value>,

    /// Opaque token for the next page, None when drained
    pub continuation: Option<String>,
}

// ============================================================================
// Capability traits
// ============================================================================

/// Create-if-absent provisioning surface of the remote store
#[async_trait]
pub trait ProvisioningClient: Send + Sync {
    async fn create_database_if_not_exists(&self, database: &str) -> Result<()>;

    async fn create_container_if_not_exists(
        &self,
        database: &str,
        spec: &ContainerSpec,
    ) -> Result<()>;
}

/// Bulk write surface of the remote store
///
/// Implementations must return exactly one outcome per submitted
/// operation; a transport-level failure fails the whole call instead.
#[async_trait]
pub trait BulkWriter: Send + Sync {
    async fn execute(
        &self,
        database: &str,
        container: &str,
        operations: &[BulkOperation],
    ) -> Result<Vec<BulkOutcome>>;
}

/// Paged query surface of the remote store
#[async_trait]
pub trait PagedQueryRunner: Send + Sync {
    async fn query_page(
        &self,
        database: &str,
        container: &str,
        query: &SqlQuery,
        continuation: Option<&str>,
    ) -> Result<QueryPage>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_container_spec_wire_shape() {
        let spec = ContainerSpec {
            name: "documents".to_string(),
            partition_key: PartitionKeyDefinition {
                paths: vec!["/id".to_string()],
                kind: PartitionKind::Hash,
                version: 2,
            },
            indexing_policy: IndexingPolicy {
                indexing_mode: "consistent".to_string(),
                excluded_paths: vec![IndexPath {
                    path: "/*".to_string(),
                }],
                included_paths: vec![IndexPath {
                    path: "/metadata/?".to_string(),
                }],
                vector_indexes: vec![VectorIndexSpec {
                    path: "/embedding".to_string(),
                    index_type: "diskANN".to_string(),
                }],
            },
            vector_embedding_policy: VectorEmbeddingPolicy {
                vector_embeddings: vec![VectorEmbedding {
                    path: "/embedding".to_string(),
                    data_type: "float32".to_string(),
                    dimensions: 1024,
                    distance_function: "cosine".to_string(),
                }],
            },
            throughput: 400,
        };

        let wire = serde_json::to_value(&spec).unwrap();
        assert_eq!(wire["id"], "documents");
        assert_eq!(wire["partitionKey"]["kind"], "Hash");
        assert_eq!(wire["indexingPolicy"]["vectorIndexes"][0]["type"], "diskANN");
        assert_eq!(
            wire["vectorEmbeddingPolicy"]["vectorEmbeddings"][0]["distanceFunction"],
            "cosine"
        );
        // Throughput travels in a header
        assert!(wire.get("throughput").is_none());
    }

    #[test]
    fn test_sql_query_parameter_lookup() {
        let query = SqlQuery {
            query: "SELECT * FROM c".to_string(),
            parameters: vec![SqlParameter::new("@topK", json!(10))],
        };

        assert_eq!(query.parameter("@topK"), Some(&json!(10)));
        assert_eq!(query.parameter("@missing"), None);
    }
}
