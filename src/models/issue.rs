use crate::models::lenient;
use serde::{Deserialize, Serialize};

/// Reference to the repository an object belongs to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryRef {
    #[serde(deserialize_with = "lenient")]
    pub id: i64,
    #[serde(deserialize_with = "lenient")]
    pub name: String,
}

/// An issue filed against a repository
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Issue {
    #[serde(deserialize_with = "lenient")]
    pub id: Option<i64>,

    /// Exact identifier, `namespace/repo#number`
    #[serde(deserialize_with = "lenient")]
    pub ident: Option<String>,

    #[serde(deserialize_with = "lenient")]
    pub repository: RepositoryRef,

    /// Per-repository sequence number
    #[serde(alias = "iid")]
    #[serde(deserialize_with = "lenient")]
    pub number: i64,

    #[serde(deserialize_with = "lenient")]
    pub title: String,

    #[serde(deserialize_with = "lenient")]
    pub description: String,

    #[serde(alias = "labels")]
    #[serde(deserialize_with = "lenient")]
    pub tags: Vec<String>,

    #[serde(deserialize_with = "lenient")]
    pub state: String,

    #[serde(deserialize_with = "lenient")]
    pub author: String,

    #[serde(deserialize_with = "lenient")]
    pub created_at: i64,

    #[serde(deserialize_with = "lenient")]
    pub updated_at: i64,
}

impl Issue {
    pub fn ident(&self) -> Option<String> {
        derive_ident(self.ident.as_deref(), &self.repository, self.number)
    }
}

/// A pull (merge) request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullRequest {
    #[serde(deserialize_with = "lenient")]
    pub id: Option<i64>,

    #[serde(deserialize_with = "lenient")]
    pub ident: Option<String>,

    #[serde(deserialize_with = "lenient")]
    pub repository: RepositoryRef,

    #[serde(alias = "iid")]
    #[serde(deserialize_with = "lenient")]
    pub number: i64,

    #[serde(deserialize_with = "lenient")]
    pub title: String,

    #[serde(deserialize_with = "lenient")]
    pub description: String,

    #[serde(alias = "labels")]
    #[serde(deserialize_with = "lenient")]
    pub tags: Vec<String>,

    #[serde(deserialize_with = "lenient")]
    pub state: String,

    #[serde(deserialize_with = "lenient")]
    pub author: String,

    #[serde(deserialize_with = "lenient")]
    pub source_branch: String,

    #[serde(deserialize_with = "lenient")]
    pub target_branch: String,

    #[serde(deserialize_with = "lenient")]
    pub created_at: i64,

    #[serde(deserialize_with = "lenient")]
    pub updated_at: i64,
}

impl PullRequest {
    pub fn ident(&self) -> Option<String> {
        derive_ident(self.ident.as_deref(), &self.repository, self.number)
    }
}

fn derive_ident(ident: Option<&str>, repository: &RepositoryRef, number: i64) -> Option<String> {
    match ident {
        Some(ident) if !ident.is_empty() => Some(ident.to_string()),
        _ if !repository.name.is_empty() && number > 0 => {
            Some(format!("{}#{}", repository.name, number))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ident_derivation() {
        let issue = Issue {
            id: Some(7),
            repository: RepositoryRef {
                id: 1,
                name: "acme/api".to_string(),
            },
            number: 42,
            ..Default::default()
        };
        assert_eq!(issue.ident().as_deref(), Some("acme/api#42"));

        let explicit = Issue {
            ident: Some("acme/web#1".to_string()),
            ..issue.clone()
        };
        assert_eq!(explicit.ident().as_deref(), Some("acme/web#1"));

        assert_eq!(Issue::default().ident(), None);
    }

    #[test]
    fn test_labels_alias() {
        let issue: Issue =
            serde_json::from_str(r#"{"id":1,"title":"t","labels":["bug","ui"]}"#).unwrap();
        assert_eq!(issue.tags, vec!["bug", "ui"]);
    }
}
