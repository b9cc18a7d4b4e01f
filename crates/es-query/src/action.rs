//! Elasticsearch query action
//!
//! Runs the configured query against a dedicated client and reports the
//! outcome on one of two ports: `result` with the raw search response, or
//! `error` with an empty object.

use crate::config::QueryConfig;
use crate::credentials::CredentialsLoader;
use es_client::ElasticClient;
use es_storage_core::prelude::*;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error};

/// Hits returned per query
pub const MAX_HITS: u64 = 20;

pub const RESULT_PORT: &str = "result";
pub const ERROR_PORT: &str = "error";

/// Value emitted on a named output port
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResult {
    pub port: String,
    pub value: Value,
}

impl ActionResult {
    pub fn new(port: &str, value: Value) -> Self {
        Self {
            port: port.to_string(),
            value,
        }
    }
}

pub struct ElasticQueryAction {
    config: QueryConfig,
    query: Value,
    client: ElasticClient,
}

impl ElasticQueryAction {
    /// Validate the configuration and connect to the configured resource
    pub async fn build(config: QueryConfig, loader: &dyn CredentialsLoader) -> Result<Self> {
        let query = config.validate()?;
        let credentials = loader.load(&config.source.id).await?;
        let client = ElasticClient::connect(credentials.to_connection_options()?).await?;

        debug!(resource = %config.source.id, index = %config.index, "Query action ready");
        Ok(Self {
            config,
            query,
            client,
        })
    }

    /// Run the query once; the client is closed afterwards
    pub async fn run(&self, _payload: &Value) -> ActionResult {
        let result = self.search().await;
        self.client.close().await;

        match result {
            Ok(response) => ActionResult::new(RESULT_PORT, response),
            Err(e) => {
                error!(error = %e, index = %self.config.index, "Elasticsearch query failed");
                ActionResult::new(ERROR_PORT, json!({}))
            }
        }
    }

    async fn search(&self) -> Result<Value> {
        let mut body = self.query.clone();
        match body {
            Value::Object(ref mut map) => {
                map.insert("size".to_string(), json!(MAX_HITS));
            }
            _ => return Err(StorageError::invalid_input("Query must be a JSON object")),
        }
        self.client.search(&self.config.index, &body).await
    }
}
