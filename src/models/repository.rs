use crate::models::lenient;
use serde::{Deserialize, Serialize};

/// A hosted source repository
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Repository {
    /// Stable identifier assigned by the hosting platform
    #[serde(deserialize_with = "lenient")]
    pub id: Option<i64>,

    /// Exact identifier, `namespace/name`
    #[serde(deserialize_with = "lenient")]
    pub ident: Option<String>,

    #[serde(deserialize_with = "lenient")]
    pub name: String,

    /// Namespace (user or group path)
    #[serde(alias = "namespace")]
    #[serde(deserialize_with = "lenient")]
    pub owner: String,

    #[serde(deserialize_with = "lenient")]
    pub description: String,

    #[serde(deserialize_with = "lenient")]
    pub url: String,

    #[serde(alias = "lang")]
    #[serde(deserialize_with = "lenient")]
    pub language: String,

    #[serde(deserialize_with = "lenient")]
    pub license: String,

    #[serde(alias = "tags")]
    #[serde(deserialize_with = "lenient")]
    pub topics: Vec<String>,

    #[serde(alias = "stars_count")]
    #[serde(deserialize_with = "lenient")]
    pub stars: i64,

    #[serde(alias = "forks_count")]
    #[serde(deserialize_with = "lenient")]
    pub forks: i64,

    /// Editorial recommendation weight
    #[serde(deserialize_with = "lenient")]
    pub recomm: i64,

    /// Whether this repository is a fork
    #[serde(deserialize_with = "lenient")]
    pub fork: bool,

    #[serde(deserialize_with = "lenient")]
    pub visibility: String,

    /// Epoch milliseconds
    #[serde(deserialize_with = "lenient")]
    pub created_at: i64,

    /// Epoch milliseconds
    #[serde(deserialize_with = "lenient")]
    pub updated_at: i64,
}

impl Repository {
    /// Identifier used for exact matching; derived from owner and name when absent
    pub fn ident(&self) -> Option<String> {
        match &self.ident {
            Some(ident) if !ident.is_empty() => Some(ident.clone()),
            _ if !self.owner.is_empty() && !self.name.is_empty() => {
                Some(format!("{}/{}", self.owner, self.name))
            }
            _ => None,
        }
    }
}
