//! Resource credentials lookup

use async_trait::async_trait;
use es_client::{BasicAuth, ConnectionOptions, Scheme};
use es_storage_core::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

/// Connection details stored with an Elasticsearch resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElasticCredentials {
    pub url: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub scheme: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl ElasticCredentials {
    /// Connection options for a dedicated client
    ///
    /// `port` is applied when the url does not carry one; basic auth is set only
    /// when both username and password are present.
    pub fn to_connection_options(&self) -> Result<ConnectionOptions> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(StorageError::config("Elasticsearch resource has no url"));
        }

        let scheme = match self.scheme.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(
                Scheme::parse(s)
                    .ok_or_else(|| StorageError::config(format!("Unsupported scheme: {}", s)))?,
            ),
        };

        let host = match self.port {
            Some(port) => with_port(url, port)?,
            None => url.to_string(),
        };

        let http_auth = match (self.username.as_deref(), self.password.as_deref()) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some(BasicAuth {
                username: u.to_string(),
                password: p.to_string(),
            }),
            _ => None,
        };

        Ok(ConnectionOptions {
            hosts: vec![host],
            scheme,
            http_auth,
            ..Default::default()
        })
    }
}

fn with_port(host: &str, port: u16) -> Result<String> {
    if !host.contains("://") {
        if host.rsplit_once(':').is_some_and(|(_, p)| p.parse::<u16>().is_ok()) {
            return Ok(host.to_string());
        }
        return Ok(format!("{}:{}", host, port));
    }

    let mut url = Url::parse(host)
        .map_err(|e| StorageError::config(format!("Invalid url {}: {}", host, e)))?;
    if url.port().is_none() {
        url.set_port(Some(port))
            .map_err(|_| StorageError::config(format!("Cannot set port on {}", host)))?;
    }
    Ok(url.to_string())
}

/// Looks up credentials by resource id
#[async_trait]
pub trait CredentialsLoader: Send + Sync {
    async fn load(&self, resource_id: &str) -> Result<ElasticCredentials>;
}

/// In-memory credentials, keyed by resource id
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    resources: HashMap<String, ElasticCredentials>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resource_id: impl Into<String>, credentials: ElasticCredentials) -> Self {
        self.resources.insert(resource_id.into(), credentials);
        self
    }
}

#[async_trait]
impl CredentialsLoader for StaticCredentials {
    async fn load(&self, resource_id: &str) -> Result<ElasticCredentials> {
        self.resources
            .get(resource_id)
            .cloned()
            .ok_or_else(|| StorageError::config(format!("Unknown resource: {}", resource_id)))
    }
}
