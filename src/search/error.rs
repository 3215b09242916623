//! Error types for index and search operations

use crate::error::AppError;

/// Result type for search operations
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Errors that can occur while writing to or reading from a type index
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Storage root missing, not a directory or unreadable
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Index initialization failed
    #[error("Index initialization failed: {0}")]
    IndexInitFailed(String),

    /// Query-language text could not be parsed
    #[error("Query parsing failed: {0}")]
    QueryParsingFailed(String),

    /// Offset pagination beyond the result window
    #[error("Result window exceeded: offset {offset} is past the limit of {limit}, use cursor pagination")]
    WindowExceeded { offset: usize, limit: usize },

    /// Malformed search-after cursor
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// Search execution failed
    #[error("Search execution failed: {0}")]
    SearchFailed(String),

    /// Document indexing failed
    #[error("Document indexing failed: {0}")]
    IndexingFailed(String),

    /// Facet taxonomy failure
    #[error("Taxonomy error: {0}")]
    TaxonomyError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Tantivy error
    #[error("Tantivy error: {0}")]
    TantivyError(String),
}

impl From<tantivy::TantivyError> for SearchError {
    fn from(err: tantivy::TantivyError) -> Self {
        SearchError::TantivyError(err.to_string())
    }
}

impl From<tantivy::query::QueryParserError> for SearchError {
    fn from(err: tantivy::query::QueryParserError) -> Self {
        SearchError::QueryParsingFailed(err.to_string())
    }
}

impl From<tantivy::directory::error::OpenDirectoryError> for SearchError {
    fn from(err: tantivy::directory::error::OpenDirectoryError) -> Self {
        SearchError::IndexInitFailed(err.to_string())
    }
}

impl From<sled::Error> for SearchError {
    fn from(err: sled::Error) -> Self {
        SearchError::TaxonomyError(err.to_string())
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::InvalidConfiguration(msg) => AppError::Configuration(msg),
            SearchError::QueryParsingFailed(_)
            | SearchError::WindowExceeded { .. }
            | SearchError::InvalidCursor(_) => AppError::Validation(err.to_string()),
            SearchError::IoError(err) => AppError::Io(err),
            _ => AppError::Storage(err.to_string()),
        }
    }
}
