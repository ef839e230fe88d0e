//! Similarity-search execution
//!
//! Builds the parameterized nearest-neighbor query and drains the paged
//! result stream into one ordered sequence of documents. Each call
//! re-executes the query from scratch.

use crate::client::{PagedQueryRunner, SqlParameter, SqlQuery};
use crate::filter;
use crate::mapper;
use lattice_core::{Document, FilterExpression, LatticeError, Result};
use serde_json::json;
use tracing::warn;

/// Upper bound the store accepts for top-k
pub const MAX_TOP_K: usize = 1000;

/// Reject an out-of-range top-k before any remote call is made
pub fn validate_top_k(top_k: usize) -> Result<()> {
    if top_k > MAX_TOP_K {
        return Err(LatticeError::InvalidArgument(format!(
            "top_k must be {MAX_TOP_K} or less, got {top_k}"
        )));
    }
    Ok(())
}

/// Build the nearest-neighbor query
///
/// Top-k, embedding, and threshold are bound parameters, never
/// interpolated into the query text. The distance function reports larger
/// values for more similar vectors, so the threshold is a lower bound and
/// the ordering is most-similar first.
pub fn build_query(
    embedding: &[f32],
    top_k: usize,
    similarity_threshold: f32,
    filter: Option<&FilterExpression>,
) -> SqlQuery {
    let mut text = String::from(
        "SELECT TOP @topK * FROM c \
         WHERE VectorDistance(c.embedding, @embedding) > @similarityThreshold",
    );

    if let Some(expr) = filter {
        text.push_str(" AND (");
        text.push_str(&filter::compile(expr));
        text.push(')');
    }

    text.push_str(" ORDER BY VectorDistance(c.embedding, @embedding)");

    SqlQuery {
        query: text,
        parameters: vec![
            SqlParameter::new("@topK", json!(top_k)),
            SqlParameter::new("@embedding", json!(embedding)),
            SqlParameter::new("@similarityThreshold", json!(similarity_threshold)),
        ],
    }
}

/// Execute a query and drain every page
///
/// Rows that fail to map are defective remote data: they fail the
/// individual read and are skipped, not the page. Execution errors
/// propagate so callers can distinguish an empty result from a failure.
pub async fn run(
    runner: &dyn PagedQueryRunner,
    database: &str,
    container: &str,
    query: &SqlQuery,
) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    let mut continuation: Option<String> = None;

    loop {
        let page = runner
            .query_page(database, container, query, continuation.as_deref())
            .await
            .map_err(|e| LatticeError::Search(format!("query execution failed: {e}")))?;

        for row in &page.documents {
            match mapper::from_wire_record(row) {
                Ok(document) => documents.push(document),
                Err(e) => warn!("skipping unmappable result row: {e}"),
            }
        }

        match page.continuation {
            Some(token) => continuation = Some(token),
            None => break,
        }
    }

    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::QueryPage;
    use async_trait::async_trait;
    use lattice_core::filter::{eq, in_list};
    use serde_json::Value;
    use std::sync::Mutex;

    #[test]
    fn test_top_k_bound() {
        assert!(validate_top_k(1000).is_ok());
        let err = validate_top_k(1001).unwrap_err();
        assert!(matches!(err, LatticeError::InvalidArgument(_)));
    }

    #[test]
    fn test_query_shape_without_filter() {
        let query = build_query(&[0.1, 0.2], 10, 0.5, None);

        assert_eq!(
            query.query,
            "SELECT TOP @topK * FROM c \
             WHERE VectorDistance(c.embedding, @embedding) > @similarityThreshold \
             ORDER BY VectorDistance(c.embedding, @embedding)"
        );
        assert_eq!(query.parameter("@topK"), Some(&json!(10)));
        assert_eq!(query.parameter("@similarityThreshold"), Some(&json!(0.5)));
        assert_eq!(
            query.parameter("@embedding").and_then(Value::as_array).map(Vec::len),
            Some(2)
        );
    }

    #[test]
    fn test_filter_is_anded_into_the_where_clause() {
        let expr = in_list("author", vec!["john", "jill"]).and(eq("article_type", "blog"));
        let query = build_query(&[0.1], 5, 0.0, Some(&expr));

        assert!(query.query.contains(
            r#"AND ((c.metadata.author IN ("john", "jill") AND c.metadata.article_type = "blog"))"#
        ));
        assert!(query.query.ends_with("ORDER BY VectorDistance(c.embedding, @embedding)"));
    }

    /// Fake pager serving a fixed sequence of pages
    struct PageSequence {
        pages: Mutex<Vec<QueryPage>>,
        requested_continuations: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl PagedQueryRunner for PageSequence {
        async fn query_page(
            &self,
            _database: &str,
            _container: &str,
            _query: &SqlQuery,
            continuation: Option<&str>,
        ) -> Result<QueryPage> {
            self.requested_continuations
                .lock()
                .unwrap()
                .push(continuation.map(str::to_string));
            Ok(self.pages.lock().unwrap().remove(0))
        }
    }

    fn row(id: &str) -> Value {
        json!({ "id": id, "content": format!("content of {id}"), "metadata": {} })
    }

    #[tokio::test]
    async fn test_drains_all_pages_in_order() {
        let runner = PageSequence {
            pages: Mutex::new(vec![
                QueryPage {
                    documents: vec![row("a"), row("b")],
                    continuation: Some("page-2".to_string()),
                },
                QueryPage {
                    documents: vec![row("c")],
                    continuation: None,
                },
            ]),
            requested_continuations: Mutex::new(Vec::new()),
        };

        let query = build_query(&[0.1], 10, 0.0, None);
        let documents = run(&runner, "db", "coll", &query).await.unwrap();

        let ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let continuations = runner.requested_continuations.lock().unwrap();
        assert_eq!(*continuations, vec![None, Some("page-2".to_string())]);
    }

    #[tokio::test]
    async fn test_unmappable_row_is_skipped_not_fatal() {
        let runner = PageSequence {
            pages: Mutex::new(vec![QueryPage {
                documents: vec![row("a"), json!({ "content": "no id" }), row("b")],
                continuation: None,
            }]),
            requested_continuations: Mutex::new(Vec::new()),
        };

        let query = build_query(&[0.1], 10, 0.0, None);
        let documents = run(&runner, "db", "coll", &query).await.unwrap();
        assert_eq!(documents.len(), 2);
    }

    /// Fake pager that always fails
    struct FailingRunner;

    #[async_trait]
    impl PagedQueryRunner for FailingRunner {
        async fn query_page(
            &self,
            _database: &str,
            _container: &str,
            _query: &SqlQuery,
            _continuation: Option<&str>,
        ) -> Result<QueryPage> {
            Err(LatticeError::Store("connection reset".to_string()))
        }
    }

    #[tokio::test]
    async fn test_execution_error_propagates_instead_of_empty_list() {
        let query = build_query(&[0.1], 10, 0.0, None);
        let err = run(&FailingRunner, "db", "coll", &query).await.unwrap_err();
        assert!(matches!(err, LatticeError::Search(_)));
    }
}
