//! Faceted full-text search for a source-hosting platform
//!
//! Repositories, issues, pull requests and code files are written to one
//! tantivy index per type by an asynchronous indexer fed from a durable task
//! queue. A convention-routed HTTP gateway accepts index tasks and webhooks
//! and serves ranked, faceted, paginated searches.

pub mod api;
pub mod config;
pub mod error;
pub mod indexer;
pub mod metrics;
pub mod models;
pub mod queue;
pub mod search;

pub use error::{AppError, Result};
