//! # ES Query
//!
//! Queries an Elasticsearch resource with a configured DSL query and reports
//! the response on the `result` port, or an empty object on the `error` port.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let loader = StaticCredentials::new().with("r1", credentials);
//! let action = ElasticQueryAction::build(config, &loader).await?;
//! let result = action.run(&payload).await;
//! ```

pub mod action;
pub mod config;
pub mod credentials;

pub use action::*;
pub use config::*;
pub use credentials::*;
