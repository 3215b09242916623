use crate::models::{lenient, RepositoryRef};
use serde::{Deserialize, Serialize};

/// One source file at a given revision of a repository
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeFile {
    #[serde(deserialize_with = "lenient")]
    pub id: Option<i64>,

    #[serde(deserialize_with = "lenient")]
    pub repository: RepositoryRef,

    /// Path relative to the repository root
    #[serde(deserialize_with = "lenient")]
    pub path: String,

    /// File name; derived from `path` when absent
    #[serde(deserialize_with = "lenient")]
    pub name: String,

    #[serde(alias = "lang")]
    #[serde(deserialize_with = "lenient")]
    pub language: String,

    #[serde(deserialize_with = "lenient")]
    pub contents: String,

    /// Commit the contents were read at
    #[serde(deserialize_with = "lenient")]
    pub revision: String,

    /// Epoch milliseconds
    #[serde(deserialize_with = "lenient")]
    pub created_at: i64,

    #[serde(deserialize_with = "lenient")]
    pub updated_at: i64,
}

impl CodeFile {
    pub fn file_name(&self) -> &str {
        if !self.name.is_empty() {
            return &self.name;
        }
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}
