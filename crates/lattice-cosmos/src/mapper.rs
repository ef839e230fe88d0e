//! Document wire mapping
//!
//! Converts between domain documents and the JSON records the container
//! stores. Embedding length is not validated here; the vector index
//! rejects mismatched dimensions at write time.

use lattice_core::{Document, LatticeError, Result};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Build the wire record for a document and its embedding
pub fn to_wire_record(document: &Document, embedding: &[f32]) -> Value {
    json!({
        "id": document.id,
        "content": document.content,
        "metadata": document.metadata,
        "embedding": embedding,
    })
}

/// Decode a wire record back into a document
///
/// A record without a string `id` or `content` is defective remote data
/// and fails this read only, never the surrounding page. Metadata is
/// decoded when present and well-formed, otherwise left empty.
pub fn from_wire_record(record: &Value) -> Result<Document> {
    let id = required_string(record, "id")?;
    let content = required_string(record, "content")?;

    let metadata: HashMap<String, Value> = match record.get("metadata") {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        _ => HashMap::new(),
    };

    Ok(Document::with_id(id, content, metadata))
}

fn required_string(record: &Value, field: &str) -> Result<String> {
    record
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            LatticeError::Mapping(format!("wire record missing string field: {field}"))
        })
}
