//! Bulk write orchestration
//!
//! Submits create/delete batches as one bulk request and correlates every
//! per-item outcome back to the originating document id. The bulk engine
//! reports outcomes by operation index only, so the orchestrator keeps an
//! ordered side table pairing each id with its operation.

use crate::client::{BulkOperation, BulkOutcome, BulkWriter};
use lattice_core::{LatticeError, Result};
use serde_json::Value;
use tracing::{info, warn};

/// Status code the remote store uses for a duplicate document id
const STATUS_CONFLICT: u16 = 409;

/// An ordered association of document ids to bulk operations
pub struct BulkBatch {
    entries: Vec<(String, BulkOperation)>,
}

impl BulkBatch {
    /// Build a create batch from (id, wire record) pairs
    pub fn creates(records: Vec<(String, Value)>) -> Self {
        let entries = records
            .into_iter()
            .map(|(id, body)| {
                let operation = BulkOperation::Create {
                    id: id.clone(),
                    body,
                };
                (id, operation)
            })
            .collect();
        Self { entries }
    }

    /// Build a delete batch from ids
    pub fn deletes(ids: Vec<String>) -> Self {
        let entries = ids
            .into_iter()
            .map(|id| (id.clone(), BulkOperation::Delete { id }))
            .collect();
        Self { entries }
    }

    /// The operations in submission order
    pub fn operations(&self) -> Vec<BulkOperation> {
        self.entries.iter().map(|(_, op)| op.clone()).collect()
    }

    /// Document id for an operation index reported by the bulk engine
    pub fn id_for(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|(id, _)| id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Submit a create batch and classify every outcome
///
/// A conflict status terminates the call as a duplicate-id error naming
/// the offending document; other items of the batch may already have been
/// applied by then. Outcomes without status information are logged and
/// skipped. Classification is deterministic regardless of the order in
/// which outcomes arrived: the conflict on the lowest operation index wins.
pub async fn execute_creates(
    writer: &dyn BulkWriter,
    database: &str,
    container: &str,
    batch: &BulkBatch,
) -> Result<()> {
    if batch.is_empty() {
        return Ok(());
    }

    let outcomes = writer
        .execute(database, container, &batch.operations())
        .await
        .map_err(|e| LatticeError::Store(format!("bulk create failed: {e}")))?;

    let mut conflict: Option<usize> = None;
    let mut failure: Option<(usize, u16)> = None;

    for outcome in &outcomes {
        match outcome.status {
            None => {
                warn!(
                    operation = outcome.operation,
                    "bulk response carried no status; skipping item"
                );
            }
            Some(STATUS_CONFLICT) => {
                conflict = Some(match conflict {
                    Some(first) => first.min(outcome.operation),
                    None => outcome.operation,
                });
            }
            Some(status) if (200..300).contains(&status) => {
                info!(status, "document added");
            }
            Some(status) => {
                failure = Some(match failure {
                    Some((first, s)) if first <= outcome.operation => (first, s),
                    _ => (outcome.operation, status),
                });
            }
        }
    }

    if let Some(index) = conflict {
        let id = batch.id_for(index).unwrap_or("unknown").to_string();
        return Err(LatticeError::DuplicateId { id });
    }

    if let Some((index, status)) = failure {
        let id = batch.id_for(index).unwrap_or("unknown");
        return Err(LatticeError::Store(format!(
            "create rejected with status {status} for document {id}"
        )));
    }

    info!(count = batch.len(), "bulk create completed");
    Ok(())
}

/// Status of a delete against an id that is already gone
const STATUS_NOT_FOUND: u16 = 404;

/// Submit a delete batch and wait for every outcome
///
/// Deletes are idempotent from the caller's perspective: an id that no
/// longer exists counts as deleted. Any other per-item rejection or a
/// transport failure fails the whole call with no per-id detail.
pub async fn execute_deletes(
    writer: &dyn BulkWriter,
    database: &str,
    container: &str,
    ids: Vec<String>,
) -> Result<()> {
    let batch = BulkBatch::deletes(ids);
    if batch.is_empty() {
        return Ok(());
    }

    let outcomes = writer
        .execute(database, container, &batch.operations())
        .await
        .map_err(|e| LatticeError::Store(format!("bulk delete failed: {e}")))?;

    for outcome in &outcomes {
        match outcome.status {
            None => {
                warn!(
                    operation = outcome.operation,
                    "bulk response carried no status; skipping item"
                );
            }
            Some(status) if (200..300).contains(&status) || status == STATUS_NOT_FOUND => {
                info!(status, "document deleted");
            }
            Some(status) => {
                return Err(LatticeError::Store(format!(
                    "delete rejected with status {status}"
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Fake bulk engine returning canned outcomes, optionally shuffled
    struct CannedWriter {
        outcomes: Mutex<Vec<BulkOutcome>>,
        submitted: Mutex<Vec<BulkOperation>>,
    }

    impl CannedWriter {
        fn new(outcomes: Vec<BulkOutcome>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes),
                submitted: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl BulkWriter for CannedWriter {
        async fn execute(
            &self,
            _database: &str,
            _container: &str,
            operations: &[BulkOperation],
        ) -> Result<Vec<BulkOutcome>> {
            *self.submitted.lock().unwrap() = operations.to_vec();
            Ok(self.outcomes.lock().unwrap().clone())
        }
    }

    fn create_batch(ids: &[&str]) -> BulkBatch {
        BulkBatch::creates(
            ids.iter()
                .map(|id| (id.to_string(), json!({ "id": id })))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_all_items_succeed() {
        let writer = CannedWriter::new(vec![
            BulkOutcome { operation: 0, status: Some(201) },
            BulkOutcome { operation: 1, status: Some(201) },
        ]);
        let batch = create_batch(&["a", "b"]);

        execute_creates(&writer, "db", "coll", &batch).await.unwrap();
        assert_eq!(writer.submitted.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_conflict_names_the_offending_id() {
        let writer = CannedWriter::new(vec![
            BulkOutcome { operation: 0, status: Some(201) },
            BulkOutcome { operation: 1, status: Some(409) },
            BulkOutcome { operation: 2, status: Some(201) },
        ]);
        let batch = create_batch(&["a", "dup", "c"]);

        let err = execute_creates(&writer, "db", "coll", &batch)
            .await
            .unwrap_err();
        match err {
            LatticeError::DuplicateId { id } => assert_eq!(id, "dup"),
            other => panic!("expected DuplicateId, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_conflict_detection_is_order_invariant() {
        // Same outcomes, arrival order reversed
        let writer = CannedWriter::new(vec![
            BulkOutcome { operation: 2, status: Some(201) },
            BulkOutcome { operation: 1, status: Some(409) },
            BulkOutcome { operation: 0, status: Some(201) },
        ]);
        let batch = create_batch(&["a", "dup", "c"]);

        let err = execute_creates(&writer, "db", "coll", &batch)
            .await
            .unwrap_err();
        assert!(matches!(err, LatticeError::DuplicateId { id } if id == "dup"));
    }

    #[tokio::test]
    async fn test_missing_status_is_not_fatal() {
        let writer = CannedWriter::new(vec![
            BulkOutcome { operation: 0, status: None },
            BulkOutcome { operation: 1, status: Some(201) },
        ]);
        let batch = create_batch(&["a", "b"]);

        execute_creates(&writer, "db", "coll", &batch).await.unwrap();
    }

    #[tokio::test]
    async fn test_remote_rejection_propagates() {
        // e.g. embedding dimensionality mismatch rejected by the index
        let writer = CannedWriter::new(vec![BulkOutcome {
            operation: 0,
            status: Some(400),
        }]);
        let batch = create_batch(&["bad"]);

        let err = execute_creates(&writer, "db", "coll", &batch)
            .await
            .unwrap_err();
        assert!(matches!(err, LatticeError::Store(_)));
    }

    #[tokio::test]
    async fn test_delete_missing_id_counts_as_deleted() {
        let writer = CannedWriter::new(vec![
            BulkOutcome { operation: 0, status: Some(204) },
            BulkOutcome { operation: 1, status: Some(404) },
        ]);

        execute_deletes(&writer, "db", "coll", vec!["a".into(), "gone".into()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_rejection_fails_the_call() {
        let writer = CannedWriter::new(vec![BulkOutcome {
            operation: 0,
            status: Some(500),
        }]);

        let result = execute_deletes(&writer, "db", "coll", vec!["a".into()]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_empty_batch_skips_the_remote_call() {
        let writer = CannedWriter::new(vec![]);
        execute_creates(&writer, "db", "coll", &create_batch(&[]))
            .await
            .unwrap();
        execute_deletes(&writer, "db", "coll", vec![]).await.unwrap();
        assert!(writer.submitted.lock().unwrap().is_empty());
    }
}
