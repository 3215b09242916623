//! Queued index tasks

use crate::models::{ObjectType, TaskAction};
use crate::queue::error::{QueueError, QueueResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload carried by a task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskBody {
    pub objects: Vec<Value>,
}

impl TaskBody {
    /// Parse and check a request payload of the form `{objects: [...]}`
    pub fn parse(raw: &[u8]) -> QueueResult<Self> {
        let value: Value = serde_json::from_slice(raw)
            .map_err(|e| QueueError::InvalidTask(format!("Body is not valid JSON: {}", e)))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> QueueResult<Self> {
        match value.get("objects") {
            Some(Value::Array(_)) => {}
            Some(_) => {
                return Err(QueueError::InvalidTask(
                    "'objects' must be an array".to_string(),
                ))
            }
            None => {
                return Err(QueueError::InvalidTask(
                    "Body must contain an 'objects' array".to_string(),
                ))
            }
        }
        let body: TaskBody = serde_json::from_value(value)
            .map_err(|e| QueueError::InvalidTask(e.to_string()))?;
        if body.objects.is_empty() {
            return Err(QueueError::InvalidTask("'objects' is empty".to_string()));
        }
        if body.objects.iter().any(|o| !o.is_object()) {
            return Err(QueueError::InvalidTask(
                "every entry of 'objects' must be an object".to_string(),
            ));
        }
        Ok(body)
    }
}

/// One unit of index work; immutable once enqueued
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueTask {
    #[serde(rename = "type")]
    pub object_type: ObjectType,

    pub action: TaskAction,

    /// JSON text of a [`TaskBody`]
    pub body: String,
}

impl QueueTask {
    pub fn new(object_type: ObjectType, action: TaskAction, body: &TaskBody) -> QueueResult<Self> {
        Ok(Self {
            object_type,
            action,
            body: serde_json::to_string(body)?,
        })
    }

    /// Decode the payload
    pub fn objects(&self) -> QueueResult<Vec<Value>> {
        let body: TaskBody = serde_json::from_str(&self.body)?;
        Ok(body.objects)
    }

    /// Wire form used by text-based providers
    pub fn to_json(&self) -> QueueResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> QueueResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let body = TaskBody {
            objects: vec![json!({"id": 1, "title": "fix login bug"})],
        };
        let task = QueueTask::new(ObjectType::Issue, TaskAction::Add, &body).unwrap();
        let wire: Value = serde_json::from_str(&task.to_json().unwrap()).unwrap();

        assert_eq!(wire["type"], "issue");
        assert_eq!(wire["action"], "add");
        let inner: Value = serde_json::from_str(wire["body"].as_str().unwrap()).unwrap();
        assert_eq!(inner["objects"][0]["id"], 1);

        let back = QueueTask::from_json(&task.to_json().unwrap()).unwrap();
        assert_eq!(back.objects().unwrap(), body.objects);
    }

    #[test]
    fn test_invalid_bodies_are_rejected() {
        assert!(TaskBody::parse(b"not json").is_err());
        assert!(TaskBody::parse(br#"{"items": []}"#).is_err());
        assert!(TaskBody::parse(br#"{"objects": {}}"#).is_err());
        assert!(TaskBody::parse(br#"{"objects": []}"#).is_err());
        assert!(TaskBody::parse(br#"{"objects": [1, 2]}"#).is_err());
        assert!(TaskBody::parse(br#"{"objects": [{"id": 1}]}"#).is_ok());
    }

    #[test]
    fn test_unknown_action_does_not_decode() {
        let raw = r#"{"type":"issue","action":"upsert","body":"{\"objects\":[]}"}"#;
        assert!(QueueTask::from_json(raw).is_err());
        let raw = r#"{"type":"wiki","action":"add","body":"{\"objects\":[]}"}"#;
        assert!(QueueTask::from_json(raw).is_err());
    }
}
