//! Query action configuration

use es_storage_core::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Query used when none is configured
pub const DEFAULT_QUERY: &str = r#"{"query":{}}"#;

/// Reference to a stored resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedEntity {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Query action configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Elasticsearch resource holding the connection credentials
    pub source: NamedEntity,

    /// Index to search
    pub index: String,

    /// Query DSL, as JSON text
    #[serde(default = "default_query")]
    pub query: String,
}

fn default_query() -> String {
    DEFAULT_QUERY.to_string()
}

impl QueryConfig {
    /// Parse the query text, failing with `InvalidInput` when it is not JSON
    pub fn validate(&self) -> Result<Value> {
        if self.index.trim().is_empty() {
            return Err(StorageError::invalid_input("Index must not be empty"));
        }
        serde_json::from_str(&self.query)
            .map_err(|e| StorageError::invalid_input(format!("Query is not valid JSON: {}", e)))
    }
}
