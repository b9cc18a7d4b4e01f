//! # ES Storage Core
//!
//! Shared types for the Elasticsearch storage client used by the CDP plugin runtime.
//!
//! - `config`: process-wide connection settings, loaded from file and `ELASTIC_*` env
//! - `error`: the `StorageError` taxonomy
//! - `document`: document records, `Outcome`, and `BulkInsertResult`
//! - `metrics`: request/bulk/scan counters
//! - `health`: the `HealthCheck` capability

pub mod config;
pub mod document;
pub mod error;
pub mod health;
pub mod metrics;

pub use config::*;
pub use document::*;
pub use error::*;
pub use health::*;
pub use metrics::*;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::ElasticConfig;
    pub use crate::document::{BulkInsertResult, BulkItemError, Document, Outcome, Params};
    pub use crate::error::{ErrorContext, ErrorContextExt, Result, StorageError};
    pub use crate::health::HealthCheck;
}
