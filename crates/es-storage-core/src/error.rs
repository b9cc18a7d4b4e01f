//! Error types for the Elasticsearch storage client
//!
//! Uses `thiserror` for ergonomic error handling with full context preservation.

use std::fmt;
use thiserror::Error;

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Primary error type for all storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Non-2xx response from the cluster
    #[error("Elasticsearch returned {status}: {reason}")]
    Remote {
        status: u16,
        error_type: Option<String>,
        reason: String,
    },

    /// Network or connection failure
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Caller passed a payload of the wrong shape
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Request/response serialization errors
    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Connection settings that cannot produce a usable client
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Scroll search failed on one or more shards
    #[error("Scan error: {message}")]
    Scan { message: String },

    /// Client was used after `close()`
    #[error("Client is closed")]
    Closed,
}

impl StorageError {
    /// Create a remote error from a status and the raw response body
    pub fn remote(status: u16, body: &serde_json::Value) -> Self {
        let error = &body["error"];
        let error_type = error["type"].as_str().map(str::to_string);
        let reason = error["reason"]
            .as_str()
            .or_else(|| error.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| match body {
                serde_json::Value::Null => format!("HTTP {}", status),
                other => other.to_string(),
            });

        Self::Remote {
            status,
            error_type,
            reason,
        }
    }

    /// Create a transport error with source
    pub fn transport_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a serialization error with source
    pub fn serialization_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Serialization {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a scan error
    pub fn scan(message: impl Into<String>) -> Self {
        Self::Scan {
            message: message.into(),
        }
    }

    /// HTTP status reported by the cluster, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if the cluster reported the resource as missing
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Check if the cluster rejected a create because the resource exists
    ///
    /// Indices report `resource_already_exists_exception`; index templates put
    /// with `create=true` report `illegal_argument_exception` with an
    /// "already exists" reason.
    pub fn is_already_exists(&self) -> bool {
        match self {
            Self::Remote {
                status: 400,
                error_type: Some(kind),
                reason,
            } => {
                kind.ends_with("already_exists_exception")
                    || (kind == "illegal_argument_exception" && reason.contains("already exists"))
            }
            _ => false,
        }
    }

    /// Check if the request never reached a node
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization_with_source("JSON encoding failed", e)
    }
}

/// Request context attached to failures in logs
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub operation: &'static str,
    pub index: Option<String>,
    pub document_id: Option<String>,
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.operation)?;
        if let Some(ref idx) = self.index {
            write!(f, " index={}", idx)?;
        }
        if let Some(ref id) = self.document_id {
            write!(f, " doc={}", id)?;
        }
        Ok(())
    }
}

/// Extension trait for tracing failures with their request context
pub trait ErrorContextExt<T> {
    fn with_context(self, ctx: ErrorContext) -> Result<T>;
}

impl<T> ErrorContextExt<T> for Result<T> {
    fn with_context(self, ctx: ErrorContext) -> Result<T> {
        self.map_err(|e| {
            tracing::debug!(
                error = %e,
                operation = ctx.operation,
                index = ?ctx.index,
                document_id = ?ctx.document_id,
                "Storage operation failed"
            );
            e
        })
    }
}
