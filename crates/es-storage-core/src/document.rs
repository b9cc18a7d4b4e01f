//! Document and result types shared by the storage client
//!
//! Defines the document record, the explicit not-found outcome, and the
//! bulk insert result handed back to callers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field name reserved for a caller-supplied document id
pub const ID_FIELD: &str = "_id";

/// A document record: field name to arbitrary JSON value
pub type Document = Map<String, Value>;

/// Optional request parameters forwarded as URL query pairs
pub type Params = Vec<(String, String)>;

/// Remove the reserved `_id` field from a record and return it as a string id
pub fn take_id(record: &mut Document) -> Option<String> {
    match record.remove(ID_FIELD)? {
        Value::String(id) => Some(id),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Outcome of an operation that tolerates a missing resource
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The resource existed and the operation produced a value
    Found(T),
    /// The cluster reported the resource as missing
    NotFound,
}

impl<T> Outcome<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Convert into an `Option`, dropping the distinction
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFound => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Found(value) => Outcome::Found(f(value)),
            Self::NotFound => Outcome::NotFound,
        }
    }
}

impl<T> From<Option<T>> for Outcome<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Self::Found(value),
            None => Self::NotFound,
        }
    }
}

/// One failed item of a bulk request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItemError {
    /// Document id reported by the cluster for the failed item
    pub id: String,
    pub status: u16,
    #[serde(rename = "type")]
    pub error_type: String,
    pub reason: String,
}

/// Result of a bulk insert
///
/// `ids` holds one id per input record in input order, including records
/// whose write failed. `errors` follows the order of the bulk response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkInsertResult {
    pub saved: usize,
    #[serde(default)]
    pub errors: Vec<BulkItemError>,
    #[serde(default)]
    pub ids: Vec<String>,
}

impl BulkInsertResult {
    /// Check if every record was written
    pub fn is_complete_success(&self) -> bool {
        self.errors.is_empty()
    }
}
