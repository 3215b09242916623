//! Faceted full-text search over per-type tantivy indexes
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │           Search Executor                        │
//! │  - search()        - search_after()             │
//! │  - facet_labels()  - shared query cache         │
//! └─────────────────────────────────────────────────┘
//!            │                          │
//!            ▼                          ▼
//! ┌────────────────────────┐  ┌─────────────────────┐
//! │     Query Planner      │  │  Document Mapper    │
//! │  boosts, facets, sort  │  │  field tables       │
//! └────────────────────────┘  └─────────────────────┘
//!            │
//!            ▼
//! ┌─────────────────────────────────────────────────┐
//! │           Storage Manager                        │
//! │  {root}/{type}/index     tantivy index          │
//! │  {root}/{type}/taxonomy  facet label ordinals   │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use forge_search::config::Config;
//! use forge_search::models::ObjectType;
//! use forge_search::search::{QueryBuilder, SearchExecutor, StorageManager};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//! let storage = Arc::new(StorageManager::new(&config.storage)?);
//! let executor = SearchExecutor::new(storage, &config.search);
//!
//! let request = QueryBuilder::new(ObjectType::Issue)
//!     .with_search_key("login")
//!     .with_facet("label", "bug")
//!     .with_sort("updated")
//!     .build();
//!
//! let page = executor.search(request).await?;
//! println!("Found {} issues", page.total_hits);
//! # Ok(())
//! # }
//! ```

mod cache;
mod document;
mod error;
mod index;
mod query;
mod service;
mod taxonomy;

pub use cache::{CachedPage, QueryCache, UsageTrackingPolicy};
pub use document::{
    build_schema, facet_dims, facet_field_name, field_defs, DocumentMapper, FieldDef, FieldKind,
    FieldValue, IndexDocument, ID_FIELD,
};
pub use error::{SearchError, SearchResult};
pub use index::{FacetReader, FacetWriter, IndexStats, ReaderHandle, StorageManager, WriterHandle};
pub use query::{
    CodeQuery, CompiledQuery, IssueQuery, PullRequestQuery, QueryBuilder, QueryPlanner,
    RepositoryQuery, SearchRequest, TypedQuery,
};
pub use service::{FacetCount, RankKey, ResultPage, SearchExecutor, DOC_ID_KEY, SCORE_KEY};
pub use taxonomy::Taxonomy;
