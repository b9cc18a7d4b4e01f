//! Process-wide client registry
//!
//! The composition root owns one `ClientRegistry`; every consumer asks it for
//! the shared client. The first caller builds the client while holding the
//! registry lock, so concurrent first calls share a single construction.

use crate::client::ElasticClient;
use crate::options::ConnectionOptions;
use es_storage_core::prelude::*;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Registry holding the shared Elasticsearch client
pub struct ClientRegistry {
    config: ElasticConfig,
    slot: Mutex<Option<Arc<ElasticClient>>>,
}

impl ClientRegistry {
    pub fn new(config: ElasticConfig) -> Self {
        Self {
            config,
            slot: Mutex::new(None),
        }
    }

    /// Create a registry from `ELASTIC_*` environment variables and an optional config file
    pub fn from_env(path: Option<&str>) -> Result<Self> {
        let config = ElasticConfig::load(path)
            .map_err(|e| StorageError::config(format!("Failed to load configuration: {}", e)))?;
        Ok(Self::new(config))
    }

    /// Settings the client is built from
    pub fn config(&self) -> &ElasticConfig {
        &self.config
    }

    /// Return the shared client, building it on first use
    ///
    /// A failed construction leaves the registry empty.
    pub async fn get_or_create(&self) -> Result<Arc<ElasticClient>> {
        let mut slot = self.slot.lock().await;
        if let Some(ref client) = *slot {
            return Ok(client.clone());
        }

        if !self.config.has_endpoint() {
            return Err(StorageError::config(
                "No Elasticsearch host or cloud_id configured",
            ));
        }

        let options = ConnectionOptions::resolve(&self.config);
        let client = Arc::new(ElasticClient::connect(options).await?);
        let nodes = client.nodes().await.len();
        debug!(nodes, "Elasticsearch client initialized");

        *slot = Some(client.clone());
        Ok(client)
    }

    /// Close and forget the shared client
    ///
    /// Must not be called while operations are in flight.
    pub async fn close(&self) {
        if let Some(client) = self.slot.lock().await.take() {
            client.close().await;
            debug!("Elasticsearch client closed");
        }
    }

    pub async fn is_initialized(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}
