//! REST transport for the remote store
//!
//! Implements the three capability traits over the Cosmos DB REST API
//! with master-key request signing. Bulk requests fan out as bounded
//! concurrent per-item sub-requests; per-item HTTP statuses are data,
//! transport failures fail the aggregate.

use crate::client::{
    BulkOperation, BulkOutcome, BulkWriter, ContainerSpec, PagedQueryRunner, ProvisioningClient,
    QueryPage, SqlQuery,
};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use hmac::{Hmac, Mac};
use lattice_core::{LatticeError, Result};
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

const API_VERSION: &str = "2018-12-31";

/// Per-item sub-requests in flight at once during a bulk call
const BULK_CONCURRENCY: usize = 16;

const STATUS_CONFLICT: u16 = 409;

/// Authenticated REST client for one Cosmos DB account
pub struct CosmosRestClient {
    http: reqwest::Client,
    endpoint: String,
    key: Vec<u8>,
}

impl CosmosRestClient {
    /// Create a client from the account endpoint and base64 master key
    pub fn new(endpoint: &str, master_key: &str) -> Result<Self> {
        let key = BASE64
            .decode(master_key)
            .map_err(|e| LatticeError::Config(format!("invalid Cosmos master key: {e}")))?;

        Ok(Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            key,
        })
    }

    /// Sign a request per the master-key scheme
    fn authorize(&self, verb: &str, resource_type: &str, resource_link: &str) -> Result<AuthHeaders> {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let payload = signature_payload(verb, resource_type, resource_link, &date);

        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| LatticeError::Config(format!("invalid Cosmos master key: {e}")))?;
        mac.update(payload.as_bytes());
        let signature = BASE64.encode(mac.finalize().into_bytes());

        let token = format!("type=master&ver=1.0&sig={signature}");
        Ok(AuthHeaders {
            authorization: urlencoding::encode(&token).into_owned(),
            date,
        })
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        resource_type: &str,
        resource_link: &str,
    ) -> Result<reqwest::RequestBuilder> {
        let auth = self.authorize(method.as_str(), resource_type, resource_link)?;
        Ok(self
            .http
            .request(method, format!("{}{path}", self.endpoint))
            .header("authorization", auth.authorization)
            .header("x-ms-date", auth.date)
            .header("x-ms-version", API_VERSION))
    }

    async fn create_document(
        &self,
        database: &str,
        container: &str,
        id: &str,
        body: &serde_json::Value,
    ) -> Result<u16> {
        let link = format!("dbs/{database}/colls/{container}");
        let response = self
            .request(reqwest::Method::POST, &format!("/{link}/docs"), "docs", &link)?
            .header("x-ms-documentdb-partitionkey", partition_key_header(id)?)
            .json(body)
            .send()
            .await
            .map_err(|e| LatticeError::Store(format!("create request failed: {e}")))?;

        Ok(response.status().as_u16())
    }

    async fn delete_document(&self, database: &str, container: &str, id: &str) -> Result<u16> {
        let link = format!("dbs/{database}/colls/{container}/docs/{id}");
        let response = self
            .request(reqwest::Method::DELETE, &format!("/{link}"), "docs", &link)?
            .header("x-ms-documentdb-partitionkey", partition_key_header(id)?)
            .send()
            .await
            .map_err(|e| LatticeError::Store(format!("delete request failed: {e}")))?;

        Ok(response.status().as_u16())
    }
}

struct AuthHeaders {
    authorization: String,
    date: String,
}

/// String-to-sign of the master-key scheme: lowercase verb, lowercase
/// resource type, the resource link verbatim, lowercase date, two
/// trailing newlines.
fn signature_payload(verb: &str, resource_type: &str, resource_link: &str, date: &str) -> String {
    format!(
        "{}\n{}\n{}\n{}\n\n",
        verb.to_lowercase(),
        resource_type.to_lowercase(),
        resource_link,
        date.to_lowercase()
    )
}

fn partition_key_header(id: &str) -> Result<String> {
    serde_json::to_string(&[id])
        .map_err(|e| LatticeError::Store(format!("failed to encode partition key: {e}")))
}

#[async_trait]
impl ProvisioningClient for CosmosRestClient {
    async fn create_database_if_not_exists(&self, database: &str) -> Result<()> {
        let response = self
            .request(reqwest::Method::POST, "/dbs", "dbs", "")?
            .json(&serde_json::json!({ "id": database }))
            .send()
            .await
            .map_err(|e| LatticeError::Provisioning(format!("create database failed: {e}")))?;

        let status = response.status();
        if status.is_success() || status.as_u16() == STATUS_CONFLICT {
            debug!(database, status = status.as_u16(), "database ensured");
            return Ok(());
        }

        let detail = response.text().await.unwrap_or_default();
        Err(LatticeError::Provisioning(format!(
            "create database returned {status}: {detail}"
        )))
    }

    async fn create_container_if_not_exists(
        &self,
        database: &str,
        spec: &ContainerSpec,
    ) -> Result<()> {
        let link = format!("dbs/{database}");
        let response = self
            .request(reqwest::Method::POST, &format!("/{link}/colls"), "colls", &link)?
            .header("x-ms-offer-throughput", spec.throughput.to_string())
            .json(spec)
            .send()
            .await
            .map_err(|e| LatticeError::Provisioning(format!("create container failed: {e}")))?;

        let status = response.status();
        if status.is_success() || status.as_u16() == STATUS_CONFLICT {
            debug!(
                database,
                container = %spec.name,
                status = status.as_u16(),
                "container ensured"
            );
            return Ok(());
        }

        let detail = response.text().await.unwrap_or_default();
        Err(LatticeError::Provisioning(format!(
            "create container returned {status}: {detail}"
        )))
    }
}

#[async_trait]
impl BulkWriter for CosmosRestClient {
    async fn execute(
        &self,
        database: &str,
        container: &str,
        operations: &[BulkOperation],
    ) -> Result<Vec<BulkOutcome>> {
        let futures: Vec<_> = operations
            .iter()
            .enumerate()
            .map(|(index, op)| self.execute_one(index, op, database, container))
            .collect();
        let outcomes = stream::iter(futures)
            .buffer_unordered(BULK_CONCURRENCY)
            .try_collect()
            .await?;

        Ok(outcomes)
    }
}

impl CosmosRestClient {
    async fn execute_one(
        &self,
        index: usize,
        op: &BulkOperation,
        database: &str,
        container: &str,
    ) -> Result<BulkOutcome> {
        let status = match op {
            BulkOperation::Create { id, body } => {
                self.create_document(database, container, id, body).await?
            }
            BulkOperation::Delete { id } => {
                self.delete_document(database, container, id).await?
            }
        };
        Ok(BulkOutcome {
            operation: index,
            status: Some(status),
        })
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(rename = "Documents", default)]
    documents: Vec<serde_json::Value>,
}

#[async_trait]
impl PagedQueryRunner for CosmosRestClient {
    async fn query_page(
        &self,
        database: &str,
        container: &str,
        query: &SqlQuery,
        continuation: Option<&str>,
    ) -> Result<QueryPage> {
        let link = format!("dbs/{database}/colls/{container}");
        let body = serde_json::to_string(query)
            .map_err(|e| LatticeError::Search(format!("failed to encode query: {e}")))?;

        let mut request = self
            .request(reqwest::Method::POST, &format!("/{link}/docs"), "docs", &link)?
            .header("content-type", "application/query+json")
            .header("x-ms-documentdb-isquery", "true")
            .header("x-ms-documentdb-query-enablecrosspartition", "true")
            .body(body);

        if let Some(token) = continuation {
            request = request.header("x-ms-continuation", token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| LatticeError::Search(format!("query request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LatticeError::Search(format!(
                "query returned {status}: {detail}"
            )));
        }

        let next = response
            .headers()
            .get("x-ms-continuation")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| LatticeError::Search(format!("failed to parse query response: {e}")))?;

        Ok(QueryPage {
            documents: parsed.documents,
            continuation: next,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::SqlParameter;
    use serde_json::json;

    // base64 of "test-master-key"
    const TEST_KEY: &str = "dGVzdC1tYXN0ZXIta2V5";

    #[test]
    fn test_signature_payload_shape() {
        let payload = signature_payload(
            "POST",
            "docs",
            "dbs/lattice/colls/documents",
            "Tue, 01 Jan 2030 00:00:00 GMT",
        );
        assert_eq!(
            payload,
            "post\ndocs\ndbs/lattice/colls/documents\ntue, 01 jan 2030 00:00:00 gmt\n\n"
        );
    }

    #[test]
    fn test_partition_key_header_is_a_json_array() {
        assert_eq!(partition_key_header("doc-1").unwrap(), r#"["doc-1"]"#);
    }

    #[test]
    fn test_rejects_invalid_master_key() {
        assert!(CosmosRestClient::new("https://localhost:8081", "not base64!").is_err());
    }

    #[tokio::test]
    async fn test_create_database_treats_conflict_as_success() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/dbs")
            .with_status(409)
            .create_async()
            .await;

        let client = CosmosRestClient::new(&server.url(), TEST_KEY).unwrap();
        client.create_database_if_not_exists("lattice").await.unwrap();
    }

    #[tokio::test]
    async fn test_create_database_propagates_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/dbs")
            .with_status(401)
            .with_body("unauthorized")
            .create_async()
            .await;

        let client = CosmosRestClient::new(&server.url(), TEST_KEY).unwrap();
        let err = client
            .create_database_if_not_exists("lattice")
            .await
            .unwrap_err();
        assert!(matches!(err, LatticeError::Provisioning(_)));
    }

    #[tokio::test]
    async fn test_query_page_parses_documents_and_continuation() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/dbs/lattice/colls/documents/docs")
            .match_header("x-ms-documentdb-isquery", "true")
            .with_status(200)
            .with_header("x-ms-continuation", "token-2")
            .with_body(
                json!({
                    "Documents": [{ "id": "a", "content": "alpha" }],
                    "_count": 1
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = CosmosRestClient::new(&server.url(), TEST_KEY).unwrap();
        let query = SqlQuery {
            query: "SELECT * FROM c".to_string(),
            parameters: vec![SqlParameter::new("@topK", json!(1))],
        };

        let page = client
            .query_page("lattice", "documents", &query, None)
            .await
            .unwrap();

        assert_eq!(page.documents.len(), 1);
        assert_eq!(page.documents[0]["id"], "a");
        assert_eq!(page.continuation.as_deref(), Some("token-2"));
    }

    #[tokio::test]
    async fn test_bulk_outcomes_keep_operation_indices() {
        let mut server = mockito::Server::new_async().await;
        let _create = server
            .mock("POST", "/dbs/lattice/colls/documents/docs")
            .with_status(201)
            .expect(2)
            .create_async()
            .await;

        let client = CosmosRestClient::new(&server.url(), TEST_KEY).unwrap();
        let operations = vec![
            BulkOperation::Create {
                id: "a".to_string(),
                body: json!({ "id": "a" }),
            },
            BulkOperation::Create {
                id: "b".to_string(),
                body: json!({ "id": "b" }),
            },
        ];

        let mut outcomes = client
            .execute("lattice", "documents", &operations)
            .await
            .unwrap();
        outcomes.sort_by_key(|o| o.operation);

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].operation, 0);
        assert_eq!(outcomes[0].status, Some(201));
        assert_eq!(outcomes[1].operation, 1);
    }
}
