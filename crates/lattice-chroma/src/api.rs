//! Chroma HTTP API client
//!
//! Thin client for the collection, add, query, and delete endpoints,
//! with optional static-token authentication for secured deployments.

use lattice_core::{LatticeError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A collection handle returned by the server
#[derive(Debug, Clone, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
}

/// Body of an add call
#[derive(Debug, Serialize)]
pub struct AddRequest {
    pub ids: Vec<String>,
    pub embeddings: Vec<Vec<f32>>,
    pub metadatas: Vec<HashMap<String, Value>>,
    pub documents: Vec<String>,
}

/// Body of a query call
#[derive(Debug, Serialize)]
pub struct QueryRequest {
    pub query_embeddings: Vec<Vec<f32>>,
    pub n_results: usize,

    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<Value>,

    pub include: Vec<String>,
}

/// Query results, grouped per query embedding
#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    pub ids: Vec<Vec<String>>,

    #[serde(default)]
    pub documents: Vec<Vec<Option<String>>>,

    #[serde(default)]
    pub metadatas: Vec<Vec<Option<HashMap<String, Value>>>>,

    #[serde(default)]
    pub distances: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct CreateCollectionRequest {
    name: String,
    get_or_create: bool,
    metadata: HashMap<String, Value>,
}

#[derive(Debug, Serialize)]
struct DeleteRequest {
    ids: Vec<String>,
}

/// Client for one Chroma server
pub struct ChromaApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ChromaApi {
    /// Create a client for an unsecured server
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            token: None,
        }
    }

    /// Use a static API token on every request
    pub fn with_key_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .post(format!("{}{path}", self.base_url.trim_end_matches('/')));
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        request
    }

    /// Fetch an existing collection by name
    pub async fn get_collection(&self, name: &str) -> Result<Collection> {
        let mut request = self.client.get(format!(
            "{}/api/v1/collections/{name}",
            self.base_url.trim_end_matches('/')
        ));
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| LatticeError::Provisioning(format!("get collection failed: {e}")))?;

        if !response.status().is_success() {
            return Err(LatticeError::Provisioning(format!(
                "collection {name} not found"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| LatticeError::Provisioning(format!("failed to parse collection: {e}")))
    }

    /// Fetch or create a collection with cosine similarity space
    pub async fn get_or_create_collection(&self, name: &str) -> Result<Collection> {
        let mut metadata = HashMap::new();
        metadata.insert("hnsw:space".to_string(), Value::String("cosine".to_string()));

        let body = CreateCollectionRequest {
            name: name.to_string(),
            get_or_create: true,
            metadata,
        };

        let response = self
            .post("/api/v1/collections")
            .json(&body)
            .send()
            .await
            .map_err(|e| LatticeError::Provisioning(format!("create collection failed: {e}")))?;

        if !response.status().is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LatticeError::Provisioning(format!(
                "create collection rejected: {detail}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| LatticeError::Provisioning(format!("failed to parse collection: {e}")))
    }

    /// Add records to a collection
    pub async fn add(&self, collection_id: &str, request: &AddRequest) -> Result<()> {
        let response = self
            .post(&format!("/api/v1/collections/{collection_id}/add"))
            .json(request)
            .send()
            .await
            .map_err(|e| LatticeError::Store(format!("add failed: {e}")))?;

        if !response.status().is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LatticeError::Store(format!("add rejected: {detail}")));
        }

        Ok(())
    }

    /// Run a nearest-neighbor query
    pub async fn query(
        &self,
        collection_id: &str,
        request: &QueryRequest,
    ) -> Result<QueryResponse> {
        let response = self
            .post(&format!("/api/v1/collections/{collection_id}/query"))
            .json(request)
            .send()
            .await
            .map_err(|e| LatticeError::Search(format!("query failed: {e}")))?;

        if !response.status().is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LatticeError::Search(format!("query rejected: {detail}")));
        }

        response
            .json()
            .await
            .map_err(|e| LatticeError::Search(format!("failed to parse query response: {e}")))
    }

    /// Delete records by id
    pub async fn delete(&self, collection_id: &str, ids: Vec<String>) -> Result<()> {
        let response = self
            .post(&format!("/api/v1/collections/{collection_id}/delete"))
            .json(&DeleteRequest { ids })
            .send()
            .await
            .map_err(|e| LatticeError::Store(format!("delete failed: {e}")))?;

        if !response.status().is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LatticeError::Store(format!("delete rejected: {detail}")));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_request_omits_absent_where_clause() {
        let request = QueryRequest {
            query_embeddings: vec![vec![0.1]],
            n_results: 5,
            where_clause: None,
            include: vec!["documents".to_string()],
        };

        let wire = serde_json::to_value(&request).unwrap();
        assert!(wire.get("where").is_none());
        assert_eq!(wire["n_results"], 5);
    }

    #[test]
    fn test_query_request_serializes_where_clause() {
        let request = QueryRequest {
            query_embeddings: vec![vec![0.1]],
            n_results: 5,
            where_clause: Some(json!({ "author": { "$eq": "john" } })),
            include: vec![],
        };

        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["where"]["author"]["$eq"], "john");
    }

    #[tokio::test]
    async fn test_token_is_sent_as_bearer() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v1/collections")
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_body(json!({ "id": "col-1", "name": "TestCollection" }).to_string())
            .create_async()
            .await;

        let api = ChromaApi::new(server.url()).with_key_token("test-token");
        let collection = api.get_or_create_collection("TestCollection").await.unwrap();

        assert_eq!(collection.id, "col-1");
        assert_eq!(collection.name, "TestCollection");
    }
}
