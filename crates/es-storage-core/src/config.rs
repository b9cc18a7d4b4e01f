//! Configuration types for the Elasticsearch storage client
//!
//! Uses the `config` crate for layered configuration from files and environment.
//! Every setting is optional: an unset value means "leave it to the client default".

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment prefix for storage settings (`ELASTIC_HOST`, `ELASTIC_CLOUD_ID`, ...)
pub const ENV_PREFIX: &str = "ELASTIC";

/// Process-wide Elasticsearch connection settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElasticConfig {
    /// Elasticsearch hosts, in connection order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host: Vec<String>,

    /// Scheme applied to hosts given without one ("http" or "https")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,

    /// CA certificate path (PEM) used instead of the platform trust store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_auth_username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_auth_password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Elastic Cloud deployment id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_id: Option<String>,

    /// Gzip request bodies and accept gzip responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_compress: Option<bool>,

    /// Enable TLS certificate verification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_certs: Option<bool>,

    /// Maximum pooled connections per node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxsize: Option<usize>,

    /// Discover cluster nodes when the client is created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sniff_on_start: Option<bool>,

    /// Rediscover cluster nodes after a connection failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sniff_on_connection_fail: Option<bool>,

    /// Interval between periodic node discoveries
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub sniffer_timeout: Option<Duration>,

    /// Per-request timeout
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<Duration>,
}

impl ElasticConfig {
    /// Load configuration from an optional file and `ELASTIC_*` environment variables
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }

        builder = builder.add_source(Self::environment());

        builder.build()?.try_deserialize()
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("host")
    }

    /// Check whether any way of reaching the cluster is configured
    pub fn has_endpoint(&self) -> bool {
        self.host.iter().any(|h| !h.trim().is_empty())
            || self.cloud_id.as_deref().is_some_and(|c| !c.is_empty())
    }
}

/// Logging settings shared by the binaries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
