//! Elasticsearch client façade
//!
//! `ElasticClient` translates local calls into REST calls against the cluster.
//! Document operations live here; bulk insert, scanning, index administration
//! and snapshots are implemented in their own modules.

use crate::options::ConnectionOptions;
use crate::transport::{Request, Response, Transport};
use async_trait::async_trait;
use es_storage_core::prelude::*;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Write-conflict retries forwarded with partial updates
pub const DEFAULT_RETRY_ON_CONFLICT: u32 = 3;

/// Elasticsearch client
pub struct ElasticClient {
    pub(crate) transport: Arc<Transport>,
    options: ConnectionOptions,
}

impl ElasticClient {
    /// Create a client and run start-up node discovery if configured
    pub async fn connect(options: ConnectionOptions) -> Result<Self> {
        let transport = Transport::new(&options)?;
        transport.start().await?;

        debug!(
            hosts = ?options.hosts,
            cloud = options.cloud_id.is_some(),
            "Elasticsearch client created"
        );

        Ok(Self {
            transport: Arc::new(transport),
            options,
        })
    }

    /// Options this client was built from
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Nodes requests are currently spread over
    pub async fn nodes(&self) -> Vec<Url> {
        self.transport.nodes().await
    }

    /// Release the connection; later calls fail with `StorageError::Closed`
    pub async fn close(&self) {
        self.transport.close();
        debug!("Elasticsearch client closed");
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }

    pub(crate) async fn send(&self, request: Request) -> Result<Response> {
        self.transport.send(request).await
    }

    pub(crate) async fn perform(&self, request: Request) -> Result<Value> {
        self.send(request).await?.into_result()
    }

    pub(crate) async fn perform_exists(&self, request: Request) -> Result<bool> {
        self.send(request).await?.into_exists()
    }

    pub(crate) async fn perform_unless_missing(&self, request: Request) -> Result<Outcome<Value>> {
        match self.perform(request).await {
            Ok(body) => Ok(Outcome::Found(body)),
            Err(e) if e.is_not_found() => Ok(Outcome::NotFound),
            Err(e) => Err(e),
        }
    }

    /// Treat "already exists" rejections as success, returning the cluster's body
    pub(crate) async fn perform_unless_exists(&self, request: Request) -> Result<Value> {
        let response = self.send(request).await?;
        if response.status.is_success() {
            return Ok(response.body);
        }

        let err = StorageError::remote(response.status.as_u16(), &response.body);
        if err.is_already_exists() {
            debug!(reason = %err, "Resource already exists, ignoring");
            return Ok(response.body);
        }
        Err(err)
    }

    // ------------------------------------------------------------------
    // Cluster
    // ------------------------------------------------------------------

    /// Check that a node answers; never fails
    pub async fn ping(&self) -> bool {
        matches!(
            self.send(Request::new("ping", Method::HEAD, &[])).await,
            Ok(response) if response.status.is_success()
        )
    }

    /// Get cluster info
    pub async fn info(&self) -> Result<Value> {
        self.perform(Request::new("info", Method::GET, &[])).await
    }

    /// Get cluster health
    pub async fn cluster_health(&self) -> Result<Value> {
        self.perform(Request::new("cluster_health", Method::GET, &["_cluster", "health"]))
            .await
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// Get document by ID
    ///
    /// Addresses a concrete index; aliases are not resolved.
    pub async fn get(&self, index: &str, id: &str) -> Result<Outcome<Value>> {
        self.perform_unless_missing(Request::new("get", Method::GET, &[index, "_doc", id]))
            .await
    }

    /// Check whether a document exists
    pub async fn exists(&self, index: &str, id: &str) -> Result<bool> {
        self.perform_exists(Request::new("exists", Method::HEAD, &[index, "_doc", id]))
            .await
    }

    /// Delete document by ID; a missing document is not an error
    pub async fn delete(&self, index: &str, id: &str) -> Result<Outcome<Value>> {
        self.perform_unless_missing(Request::new("delete", Method::DELETE, &[index, "_doc", id]))
            .await
    }

    /// Delete every document matching `query`; a missing index is not an error
    pub async fn delete_by_query(&self, index: &str, query: &Value) -> Result<Outcome<Value>> {
        let request = Request::new("delete_by_query", Method::POST, &[index, "_delete_by_query"])
            .json(query.clone());
        self.perform_unless_missing(request).await
    }

    /// Run a search and return the raw response
    pub async fn search(&self, index: &str, query: &Value) -> Result<Value> {
        self.perform(Request::new("search", Method::POST, &[index, "_search"]).json(query.clone()))
            .await
    }

    /// Count documents matching `query` (all documents when `None`)
    pub async fn count(&self, index: &str, query: Option<&Value>) -> Result<u64> {
        let request = Request::new("count", Method::POST, &[index, "_count"]).json_opt(query);
        let body = self.perform(request).await?;

        body["count"].as_u64().ok_or_else(|| StorageError::Serialization {
            message: "Count response has no 'count' field".to_string(),
            source: None,
        })
    }

    /// Partial update with the default conflict retry count
    pub async fn update(&self, index: &str, id: &str, record: &Value) -> Result<Value> {
        self.update_with_retries(index, id, record, DEFAULT_RETRY_ON_CONFLICT)
            .await
    }

    /// Partial update; `retry_on_conflict` is applied by the cluster
    pub async fn update_with_retries(
        &self,
        index: &str,
        id: &str,
        record: &Value,
        retry_on_conflict: u32,
    ) -> Result<Value> {
        let request = Request::new("update", Method::POST, &[index, "_update", id])
            .param("retry_on_conflict", retry_on_conflict)
            .json(record.clone());
        self.perform(request).await
    }
}

#[async_trait]
impl HealthCheck for ElasticClient {
    async fn health_check(&self) -> Result<()> {
        let health = self.cluster_health().await?;
        match health["status"].as_str() {
            Some("red") => Err(StorageError::Remote {
                status: 503,
                error_type: Some("cluster_health".to_string()),
                reason: "Cluster status is red".to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn component_name(&self) -> &'static str {
        "elastic_client"
    }
}
