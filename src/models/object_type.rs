use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Category of indexed object; each type owns one index and one taxonomy
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum ObjectType {
    #[serde(rename = "repo", alias = "repository")]
    #[strum(to_string = "repo", serialize = "repository")]
    Repository,

    #[strum(to_string = "issue")]
    Issue,

    #[serde(rename = "pr", alias = "pull_request")]
    #[strum(to_string = "pr", serialize = "pull_request")]
    PullRequest,

    #[strum(to_string = "code")]
    Code,
}

impl ObjectType {
    /// The closed set of types known at startup
    pub const ALL: [ObjectType; 4] = [
        ObjectType::Repository,
        ObjectType::Issue,
        ObjectType::PullRequest,
        ObjectType::Code,
    ];

    /// Lowercase name used for storage directories and wire payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Repository => "repo",
            ObjectType::Issue => "issue",
            ObjectType::PullRequest => "pr",
            ObjectType::Code => "code",
        }
    }
}

/// Mutation carried by a queued task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TaskAction {
    Add,
    Update,
    Delete,
}
