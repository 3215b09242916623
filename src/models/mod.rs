pub mod code;
pub mod issue;
pub mod object_type;
pub mod repository;

pub use code::*;
pub use issue::*;
pub use object_type::*;
pub use repository::*;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

/// Field deserializer that maps `null` and mistyped values to the default
///
/// Hosting platforms routinely send `null` for optional attributes; one such
/// attribute must not make the whole object unindexable.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_and_mistyped_fields_fall_back_to_default() {
        let repo: Repository = serde_json::from_value(serde_json::json!({
            "id": 3,
            "name": "api",
            "description": null,
            "topics": null,
            "stars": "many",
            "fork": null
        }))
        .unwrap();

        assert_eq!(repo.id, Some(3));
        assert_eq!(repo.name, "api");
        assert_eq!(repo.description, "");
        assert!(repo.topics.is_empty());
        assert_eq!(repo.stars, 0);
        assert!(!repo.fork);
    }

    #[test]
    fn test_mistyped_id_is_absent() {
        let issue: Issue =
            serde_json::from_value(serde_json::json!({"id": "seven", "title": "t"})).unwrap();
        assert_eq!(issue.id, None);
        assert_eq!(issue.title, "t");
    }
}
