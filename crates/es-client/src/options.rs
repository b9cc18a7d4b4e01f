//! Connection options resolved from process-wide settings
//!
//! `ConnectionOptions::resolve` is pure: it reads an `ElasticConfig` and forwards
//! every present, non-empty setting. Nothing is defaulted here, so the transport's
//! own defaults apply to whatever the settings leave out.

use es_storage_core::ElasticConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// URL scheme for hosts given without one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    /// Parse a configured scheme, ignoring case and surrounding whitespace
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            _ => None,
        }
    }
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Username/password pair for basic authentication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

/// API key id/secret pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: String,
    pub key: String,
}

/// Typed connection options handed to the transport
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionOptions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<Scheme>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_auth: Option<BasicAuth>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<ApiKey>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_id: Option<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub http_compress: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_certs: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxsize: Option<usize>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub sniff_on_start: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub sniff_on_connection_fail: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sniffer_timeout: Option<Duration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<Duration>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ConnectionOptions {
    /// Build connection options from process-wide settings. Never fails.
    pub fn resolve(config: &ElasticConfig) -> Self {
        let mut options = Self {
            hosts: config
                .host
                .iter()
                .map(|h| h.trim())
                .filter(|h| !h.is_empty())
                .map(str::to_string)
                .collect(),
            ..Default::default()
        };

        if let Some(ref scheme) = config.scheme {
            options.scheme = Scheme::parse(scheme);
        }
        if let Some(timeout) = config.sniffer_timeout.filter(|t| !t.is_zero()) {
            options.sniffer_timeout = Some(timeout);
        }
        options.sniff_on_start = config.sniff_on_start.unwrap_or(false);
        options.sniff_on_connection_fail = config.sniff_on_connection_fail.unwrap_or(false);
        if let Some(maxsize) = config.maxsize.filter(|m| *m > 0) {
            options.maxsize = Some(maxsize);
        }

        if let Some(ref path) = config.ca_file {
            if !path.as_os_str().is_empty() {
                options.ca_file = Some(path.clone());
            }
        }

        if let (Some(username), Some(password)) = (
            non_empty(&config.http_auth_username),
            non_empty(&config.http_auth_password),
        ) {
            options.http_auth = Some(BasicAuth { username, password });
        }

        options.cloud_id = non_empty(&config.cloud_id);

        if let (Some(id), Some(key)) = (non_empty(&config.api_key_id), non_empty(&config.api_key)) {
            options.api_key = Some(ApiKey { id, key });
        }

        options.http_compress = config.http_compress.unwrap_or(false);
        options.verify_certs = config.verify_certs;
        options.request_timeout = config.request_timeout;

        options
    }

    /// Whether periodic or failure-triggered node discovery is enabled
    pub fn sniffing_enabled(&self) -> bool {
        self.sniff_on_start || self.sniff_on_connection_fail || self.sniffer_timeout.is_some()
    }
}
