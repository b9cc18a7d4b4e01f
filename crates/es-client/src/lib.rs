//! # ES Client
//!
//! Asynchronous Elasticsearch storage client.
//!
//! One `ClientRegistry` per process resolves `ElasticConfig` into
//! `ConnectionOptions` and lazily builds the shared `ElasticClient`. The client
//! exposes document, bulk, scan, index, alias, template and snapshot operations;
//! store failures surface as `StorageError`, except where a missing document or
//! an existing index is part of the operation's contract.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let registry = ClientRegistry::from_env(None)?;
//! let client = registry.get_or_create().await?;
//!
//! let result = client.insert("widgets", records).await?;
//! let mut cursor = client.scan("widgets", &json!({"query": {"match_all": {}}})).await?;
//! while let Some(hit) = cursor.next().await? {
//!     // ...
//! }
//!
//! registry.close().await;
//! ```

pub mod bulk;
pub mod client;
pub mod indices;
pub mod options;
pub mod registry;
pub mod scan;
pub mod snapshot;
mod transport;

pub use bulk::BULK_CHUNK_SIZE;
pub use client::*;
pub use indices::REINDEX_WAIT_FOR_COMPLETION;
pub use options::*;
pub use registry::*;
pub use scan::*;
pub use transport::{cloud_url, node_url, CLOUD_DEFAULT_PORT, DEFAULT_PORT};
