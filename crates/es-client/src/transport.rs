//! HTTP transport to the Elasticsearch cluster
//!
//! Owns the pooled reqwest client, the live node list, authentication and
//! compression. Node selection is round-robin; the node list may be replaced by
//! sniffing.

use crate::options::{ConnectionOptions, Scheme};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use es_storage_core::metrics::LatencyTimer;
use es_storage_core::prelude::*;
use es_storage_core::ClientMetrics;
use flate2::{write::GzEncoder, Compression};
use reqwest::{header, Client, Method, RequestBuilder, StatusCode};
use serde_json::Value;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, trace, warn};
use url::Url;

/// Port used for hosts configured without one
pub const DEFAULT_PORT: u16 = 9200;

/// Port used for cloud endpoints that do not carry one
pub const CLOUD_DEFAULT_PORT: u16 = 443;

/// Request body
#[derive(Debug, Clone)]
pub(crate) enum Body {
    Json(Value),
    NdJson(String),
}

/// A single REST call, addressed by path segments relative to a node
#[derive(Debug, Clone)]
pub(crate) struct Request {
    pub operation: &'static str,
    pub method: Method,
    pub path: Vec<String>,
    pub params: Vec<(String, String)>,
    pub body: Option<Body>,
}

impl Request {
    pub fn new(operation: &'static str, method: Method, path: &[&str]) -> Self {
        Self {
            operation,
            method,
            path: path.iter().map(|s| s.to_string()).collect(),
            params: Vec::new(),
            body: None,
        }
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    pub fn params(mut self, params: Option<&Params>) -> Self {
        if let Some(params) = params {
            self.params.extend(params.iter().cloned());
        }
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(Body::Json(body));
        self
    }

    pub fn json_opt(mut self, body: Option<&Value>) -> Self {
        if let Some(body) = body {
            self.body = Some(Body::Json(body.clone()));
        }
        self
    }

    pub fn ndjson(mut self, body: String) -> Self {
        self.body = Some(Body::NdJson(body));
        self
    }

    /// Reject blank index, id or resource names
    ///
    /// A blank segment would collapse the path and widen the call.
    pub fn validate(&self) -> Result<()> {
        match self.path.iter().position(|s| s.trim().is_empty()) {
            Some(pos) => Err(StorageError::invalid_input(format!(
                "{} requires a non-empty name at path position {}",
                self.operation, pos
            ))),
            None => Ok(()),
        }
    }
}

/// Status and decoded body of a cluster response
#[derive(Debug)]
pub(crate) struct Response {
    pub status: StatusCode,
    pub body: Value,
}

impl Response {
    /// Body of a 2xx response, or a `Remote` error for anything else
    pub fn into_result(self) -> Result<Value> {
        if self.status.is_success() {
            Ok(self.body)
        } else {
            Err(StorageError::remote(self.status.as_u16(), &self.body))
        }
    }

    /// Outcome of a HEAD-style existence probe
    pub fn into_exists(self) -> Result<bool> {
        match self.status {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(StorageError::remote(s.as_u16(), &self.body)),
        }
    }
}

enum Auth {
    ApiKey(String),
    Basic { username: String, password: String },
}

/// Elasticsearch transport
pub(crate) struct Transport {
    http: Client,
    nodes: RwLock<Vec<Url>>,
    next_node: AtomicUsize,
    scheme: Scheme,
    auth: Option<Auth>,
    compress: bool,
    sniff_on_start: bool,
    sniff_on_connection_fail: bool,
    sniffer_timeout: Option<Duration>,
    last_sniff: Mutex<Instant>,
    closed: AtomicBool,
    metrics: ClientMetrics,
}

impl Transport {
    /// Create a transport from resolved options
    ///
    /// Fails when no node can be derived or the TLS settings cannot be loaded.
    pub fn new(options: &ConnectionOptions) -> Result<Self> {
        let scheme = options.scheme.unwrap_or_default();

        let nodes = match options.cloud_id {
            Some(ref cloud_id) => {
                if !options.hosts.is_empty() {
                    warn!("Both cloud_id and hosts configured, using cloud_id");
                }
                vec![cloud_url(cloud_id)?]
            }
            None => options
                .hosts
                .iter()
                .map(|h| node_url(h, scheme))
                .collect::<Result<Vec<_>>>()?,
        };

        if nodes.is_empty() {
            return Err(StorageError::config(
                "No Elasticsearch hosts or cloud_id configured",
            ));
        }

        let mut builder = Client::builder().gzip(options.http_compress);

        if let Some(maxsize) = options.maxsize {
            builder = builder.pool_max_idle_per_host(maxsize);
        }
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        if options.verify_certs == Some(false) {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(ref path) = options.ca_file {
            let pem = std::fs::read(path).map_err(|e| {
                StorageError::config(format!("Failed to read CA file {}: {}", path.display(), e))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                StorageError::config(format!("Invalid CA file {}: {}", path.display(), e))
            })?;
            builder = builder.add_root_certificate(cert);
        }

        let http = builder
            .build()
            .map_err(|e| StorageError::config(format!("Failed to create HTTP client: {}", e)))?;

        let auth = if let Some(ref key) = options.api_key {
            Some(Auth::ApiKey(BASE64.encode(format!("{}:{}", key.id, key.key))))
        } else {
            options.http_auth.as_ref().map(|basic| Auth::Basic {
                username: basic.username.clone(),
                password: basic.password.clone(),
            })
        };

        let sniffing = options.sniffing_enabled() && options.cloud_id.is_none();
        if options.sniffing_enabled() && !sniffing {
            warn!("Sniffing is not supported with cloud_id, disabling");
        }

        Ok(Self {
            http,
            nodes: RwLock::new(nodes),
            next_node: AtomicUsize::new(0),
            scheme,
            auth,
            compress: options.http_compress,
            sniff_on_start: sniffing && options.sniff_on_start,
            sniff_on_connection_fail: sniffing && options.sniff_on_connection_fail,
            sniffer_timeout: options.sniffer_timeout.filter(|_| sniffing),
            last_sniff: Mutex::new(Instant::now()),
            closed: AtomicBool::new(false),
            metrics: ClientMetrics::new("es_client"),
        })
    }

    /// Run start-up node discovery, if configured
    pub async fn start(&self) -> Result<()> {
        if self.sniff_on_start {
            self.sniff().await?;
        }
        Ok(())
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn metrics(&self) -> &ClientMetrics {
        &self.metrics
    }

    /// Snapshot of the current node list
    pub async fn nodes(&self) -> Vec<Url> {
        self.nodes.read().await.clone()
    }

    /// Get the next node (round-robin for load balancing)
    async fn node(&self) -> Url {
        let nodes = self.nodes.read().await;
        let idx = self.next_node.fetch_add(1, Ordering::Relaxed) % nodes.len();
        nodes[idx].clone()
    }

    /// Send a request and return the raw response, whatever its status
    pub async fn send(&self, request: Request) -> Result<Response> {
        if self.is_closed() {
            return Err(StorageError::Closed);
        }
        request.validate()?;

        self.maybe_sniff().await;

        let node = self.node().await;
        match self.execute(&node, request).await {
            Err(e) if e.is_connection_failure() && self.sniff_on_connection_fail => {
                if let Err(sniff_err) = self.sniff().await {
                    warn!(error = %sniff_err, "Sniffing after connection failure failed");
                }
                Err(e)
            }
            other => other,
        }
    }

    async fn execute(&self, node: &Url, request: Request) -> Result<Response> {
        let operation = request.operation;
        let url = request_url(node, &request)?;
        let mut req = self.authorize(self.http.request(request.method, url));

        if let Some(body) = request.body {
            req = self.attach_body(req, body)?;
        }

        let metrics = &self.metrics;
        let timer = LatencyTimer::start(move |d| metrics.record_latency(operation, d));

        let resp = req.send().await.map_err(|e| {
            self.metrics.record_transport_error(operation);
            StorageError::transport_with_source(format!("{} request to {} failed", operation, node), e)
        })?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| StorageError::transport_with_source("Failed to read response body", e))?;
        timer.stop();

        self.metrics.record_request(operation, status.as_u16());
        trace!(operation, status = status.as_u16(), "Request completed");

        Ok(Response {
            status,
            body: parse_body(&bytes),
        })
    }

    /// Add authentication
    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match self.auth {
            Some(Auth::ApiKey(ref encoded)) => {
                req.header(header::AUTHORIZATION, format!("ApiKey {}", encoded))
            }
            Some(Auth::Basic {
                ref username,
                ref password,
            }) => req.basic_auth(username, Some(password)),
            None => req,
        }
    }

    fn attach_body(&self, req: RequestBuilder, body: Body) -> Result<RequestBuilder> {
        let (content_type, bytes) = match body {
            Body::Json(value) => ("application/json", serde_json::to_vec(&value)?),
            Body::NdJson(lines) => ("application/x-ndjson", lines.into_bytes()),
        };
        let req = req.header(header::CONTENT_TYPE, content_type);

        if !self.compress {
            return Ok(req.body(bytes));
        }

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&bytes)
            .map_err(|e| StorageError::serialization_with_source("Failed to gzip request body", e))?;
        let compressed = encoder
            .finish()
            .map_err(|e| StorageError::serialization_with_source("Failed to gzip request body", e))?;

        Ok(req.header(header::CONTENT_ENCODING, "gzip").body(compressed))
    }

    /// Sniff when the configured interval has elapsed
    async fn maybe_sniff(&self) {
        let Some(timeout) = self.sniffer_timeout else {
            return;
        };

        {
            let mut last = self.last_sniff.lock().await;
            if last.elapsed() < timeout {
                return;
            }
            // claim this round so concurrent callers skip it
            *last = Instant::now();
        }

        if let Err(e) = self.sniff().await {
            warn!(error = %e, "Periodic sniffing failed");
        }
    }

    /// Replace the node list with the cluster's HTTP publish addresses
    pub async fn sniff(&self) -> Result<()> {
        let node = self.node().await;
        let request = Request::new("sniff", Method::GET, &["_nodes", "_all", "http"]);

        let body = match self.execute(&node, request).await.and_then(Response::into_result) {
            Ok(body) => body,
            Err(e) => {
                self.metrics.record_sniff("failed");
                return Err(e);
            }
        };

        let discovered = publish_addresses(&body, self.scheme);
        if discovered.is_empty() {
            self.metrics.record_sniff("empty");
            return Err(StorageError::config("Sniffing found no HTTP-enabled nodes"));
        }

        debug!(nodes = discovered.len(), "Sniffed cluster nodes");
        *self.nodes.write().await = discovered;
        *self.last_sniff.lock().await = Instant::now();
        self.metrics.record_sniff("ok");
        Ok(())
    }
}

fn parse_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

fn request_url(node: &Url, request: &Request) -> Result<Url> {
    let mut url = node.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| StorageError::config(format!("Node URL {} cannot be a base", node)))?;
        segments.pop_if_empty();
        for segment in &request.path {
            segments.push(segment);
        }
    }
    if !request.params.is_empty() {
        url.query_pairs_mut().extend_pairs(&request.params);
    }
    Ok(url)
}

fn has_explicit_port(authority: &str) -> bool {
    authority
        .rsplit_once(':')
        .is_some_and(|(_, port)| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
}

/// Normalize a configured host into a node URL
///
/// Hosts without a scheme get `scheme`, and `DEFAULT_PORT` unless they name a port.
/// Full URLs are taken as given.
pub fn node_url(host: &str, scheme: Scheme) -> Result<Url> {
    let host = host.trim();
    if host.contains("://") {
        return Url::parse(host)
            .map_err(|e| StorageError::config(format!("Invalid host '{}': {}", host, e)));
    }

    let authority = host.split('/').next().unwrap_or(host);
    let raw = if has_explicit_port(authority) {
        format!("{}://{}", scheme, host)
    } else {
        format!("{}://{}:{}", scheme, host, DEFAULT_PORT)
    };

    Url::parse(&raw).map_err(|e| StorageError::config(format!("Invalid host '{}': {}", host, e)))
}

/// Decode an Elastic Cloud id (`name:base64(domain[:port]$es_uuid$...)`)
pub fn cloud_url(cloud_id: &str) -> Result<Url> {
    let invalid = |reason: &str| StorageError::config(format!("Invalid cloud_id: {}", reason));

    let (_, encoded) = cloud_id
        .split_once(':')
        .ok_or_else(|| invalid("expected 'name:payload'"))?;
    let decoded = BASE64
        .decode(encoded.trim())
        .map_err(|_| invalid("payload is not base64"))?;
    let decoded = String::from_utf8(decoded).map_err(|_| invalid("payload is not UTF-8"))?;

    let mut parts = decoded.split('$');
    let domain = parts
        .next()
        .filter(|d| !d.is_empty())
        .ok_or_else(|| invalid("missing domain"))?;
    let es_uuid = parts
        .next()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| invalid("missing Elasticsearch id"))?;

    let (domain, port) = match domain.rsplit_once(':') {
        Some((domain, port)) => (
            domain,
            port.parse::<u16>().map_err(|_| invalid("bad port"))?,
        ),
        None => (domain, CLOUD_DEFAULT_PORT),
    };

    Url::parse(&format!("https://{}.{}:{}", es_uuid, domain, port))
        .map_err(|e| invalid(&e.to_string()))
}

/// Extract node URLs from a `_nodes/_all/http` response
fn publish_addresses(body: &Value, scheme: Scheme) -> Vec<Url> {
    let Some(nodes) = body["nodes"].as_object() else {
        return Vec::new();
    };

    nodes
        .values()
        .filter_map(|node| {
            let address = node["http"]["publish_address"].as_str()?;
            // "hostname/ip:port" prefers the hostname
            let address = match address.split_once('/') {
                Some((hostname, rest)) if !hostname.is_empty() => {
                    let (_, port) = rest.rsplit_once(':')?;
                    format!("{}:{}", hostname, port)
                }
                Some((_, rest)) => rest.to_string(),
                None => address.to_string(),
            };
            node_url(&address, scheme).ok()
        })
        .collect()
}
