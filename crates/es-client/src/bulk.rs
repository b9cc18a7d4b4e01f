//! Bulk insert
//!
//! Records are written with the `_bulk` API as `index` actions. Ids are assigned
//! before submission, so the returned id list always matches the input.

use crate::client::ElasticClient;
use crate::transport::Request;
use es_storage_core::document::take_id;
use es_storage_core::prelude::*;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

/// Maximum actions per `_bulk` request
pub const BULK_CHUNK_SIZE: usize = 500;

struct IndexAction {
    id: String,
    source: Document,
}

/// Bulk response
#[derive(Debug, Clone, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    took: u64,
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<BulkResponseItem>,
}

/// Bulk response item, keyed by the action that produced it
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
enum BulkResponseItem {
    Index(BulkResponseResult),
    Create(BulkResponseResult),
    Update(BulkResponseResult),
    Delete(BulkResponseResult),
}

impl BulkResponseItem {
    fn result(&self) -> &BulkResponseResult {
        match self {
            Self::Index(r) | Self::Create(r) | Self::Update(r) | Self::Delete(r) => r,
        }
    }
}

/// Bulk response result
#[derive(Debug, Clone, Deserialize)]
struct BulkResponseResult {
    #[serde(rename = "_id", default)]
    id: String,
    status: u16,
    #[serde(default)]
    error: Option<BulkError>,
}

impl BulkResponseResult {
    fn is_success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status)
    }
}

/// Bulk error
#[derive(Debug, Clone, Deserialize)]
struct BulkError {
    #[serde(rename = "type", default)]
    error_type: String,
    #[serde(default)]
    reason: String,
}

fn to_ndjson(index: &str, actions: &[IndexAction]) -> Result<String> {
    let mut body = String::new();
    for action in actions {
        body.push_str(&serde_json::to_string(&json!({
            "index": {
                "_index": index,
                "_id": action.id
            }
        }))?);
        body.push('\n');
        body.push_str(&serde_json::to_string(&action.source)?);
        body.push('\n');
    }
    Ok(body)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl ElasticClient {
    /// Insert records into `index` with one bulk round trip per chunk
    ///
    /// A record's `_id` field is used as its id and removed from the stored
    /// source; records without one get a random UUID.
    pub async fn insert(&self, index: &str, records: Vec<Document>) -> Result<BulkInsertResult> {
        if index.trim().is_empty() {
            return Err(StorageError::invalid_input("insert requires a non-empty index"));
        }

        let mut ids = Vec::with_capacity(records.len());
        let mut actions = Vec::with_capacity(records.len());

        for mut record in records {
            let id = take_id(&mut record).unwrap_or_else(|| Uuid::new_v4().to_string());
            ids.push(id.clone());
            actions.push(IndexAction { id, source: record });
        }

        let mut result = BulkInsertResult {
            saved: 0,
            errors: Vec::new(),
            ids,
        };

        for chunk in actions.chunks(BULK_CHUNK_SIZE) {
            let request = Request::new("bulk", Method::POST, &["_bulk"]).ndjson(to_ndjson(index, chunk)?);
            let body = self.perform(request).await.with_context(ErrorContext {
                operation: "bulk",
                index: Some(index.to_string()),
                document_id: None,
            })?;

            let response: BulkResponse = serde_json::from_value(body).map_err(|e| {
                StorageError::serialization_with_source("Failed to parse bulk response", e)
            })?;

            for item in &response.items {
                let item = item.result();
                if item.is_success() {
                    result.saved += 1;
                    continue;
                }
                let (error_type, reason) = match item.error {
                    Some(ref e) => (e.error_type.clone(), e.reason.clone()),
                    None => ("unknown".to_string(), format!("status {}", item.status)),
                };
                result.errors.push(BulkItemError {
                    id: item.id.clone(),
                    status: item.status,
                    error_type,
                    reason,
                });
            }

            debug!(
                took = response.took,
                errors = response.errors,
                items = response.items.len(),
                "Bulk chunk completed"
            );
        }

        self.transport
            .metrics()
            .record_bulk(index, result.saved, result.errors.len());

        Ok(result)
    }

    /// Insert an untyped payload, which must be an array of objects
    ///
    /// Any other shape fails with `InvalidInput` before a request is made.
    pub async fn insert_value(&self, index: &str, payload: Value) -> Result<BulkInsertResult> {
        let items = match payload {
            Value::Array(items) => items,
            other => {
                return Err(StorageError::invalid_input(format!(
                    "Insert expects payload to be a list, got {}",
                    value_kind(&other)
                )))
            }
        };

        let records = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(record) => Ok(record),
                other => Err(StorageError::invalid_input(format!(
                    "Insert expects record {} to be an object, got {}",
                    i,
                    value_kind(&other)
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        self.insert(index, records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::client_for;
    use std::collections::HashSet;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request as MockRequest, Respond, ResponseTemplate};

    /// Answers every bulk request with one 201 item per action
    struct AcceptAll;

    impl Respond for AcceptAll {
        fn respond(&self, request: &MockRequest) -> ResponseTemplate {
            let body = String::from_utf8_lossy(&request.body).to_string();
            let items: Vec<Value> = body
                .lines()
                .step_by(2)
                .map(|line| {
                    let action: Value = serde_json::from_str(line).unwrap();
                    json!({"index": {"_index": action["index"]["_index"], "_id": action["index"]["_id"], "status": 201}})
                })
                .collect();
            ResponseTemplate::new(200).set_body_json(json!({"took": 1, "errors": false, "items": items}))
        }
    }

    fn records(value: Value) -> Vec<Document> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_insert_reuses_and_generates_ids() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(AcceptAll)
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result = client
            .insert("widgets", records(json!([{"_id": "a", "x": 1}, {"x": 2}])))
            .await
            .unwrap();

        assert_eq!(result.ids.len(), 2);
        assert_eq!(result.ids[0], "a");
        assert!(!result.ids[1].is_empty());
        assert_ne!(result.ids[1], "a");
        assert_eq!(result.saved, 2);
        assert!(result.errors.is_empty());

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body).to_string();
        let lines: Vec<Value> = body.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines[0], json!({"index": {"_index": "widgets", "_id": "a"}}));
        assert_eq!(lines[1], json!({"x": 1}));
        assert_eq!(lines[3], json!({"x": 2}));
    }

    #[tokio::test]
    async fn test_insert_ids_are_unique_across_chunks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(AcceptAll)
            .expect(3)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let input: Vec<Document> = (0..1200)
            .map(|i| json!({"n": i}).as_object().cloned().unwrap())
            .collect();
        let result = client.insert("widgets", input).await.unwrap();

        assert_eq!(result.ids.len(), 1200);
        assert_eq!(result.saved, 1200);
        let unique: HashSet<_> = result.ids.iter().collect();
        assert_eq!(unique.len(), 1200);
    }

    #[tokio::test]
    async fn test_insert_keeps_ids_for_failed_items() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "took": 2,
                "errors": true,
                "items": [
                    {"index": {"_index": "widgets", "_id": "a", "status": 201}},
                    {"index": {"_index": "widgets", "_id": "b", "status": 400,
                        "error": {"type": "mapper_parsing_exception", "reason": "failed to parse field [x]"}}}
                ]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result = client
            .insert("widgets", records(json!([{"_id": "a", "x": 1}, {"_id": "b", "x": "nope"}])))
            .await
            .unwrap();

        assert_eq!(result.ids, vec!["a", "b"]);
        assert_eq!(result.saved, 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].error_type, "mapper_parsing_exception");
        assert!(!result.is_complete_success());
    }

    #[tokio::test]
    async fn test_insert_empty_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(AcceptAll)
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result = client.insert("widgets", Vec::new()).await.unwrap();
        assert_eq!(result, BulkInsertResult::default());
    }

    #[tokio::test]
    async fn test_insert_value_rejects_non_list() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(AcceptAll)
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server).await;

        let err = client
            .insert_value("widgets", json!({"_id": "a"}))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, StorageError::InvalidInput { .. }));

        let err = client
            .insert_value("widgets", json!([{"x": 1}, 2]))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, StorageError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_insert_blank_index_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(AcceptAll)
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .insert(" ", records(json!([{"x": 1}])))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, StorageError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_insert_value_accepts_list() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(AcceptAll)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result = client
            .insert_value("widgets", json!([{"_id": "a", "x": 1}, {"x": 2}]))
            .await
            .unwrap();
        assert_eq!(result.saved, 2);
        assert_eq!(result.ids[0], "a");
    }
}
