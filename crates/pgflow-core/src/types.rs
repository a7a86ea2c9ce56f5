use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::CoreError;

/// Message property carrying the SQL text on input and the rows on output
pub const PAYLOAD: &str = "payload";

/// Message property carrying the query parameters
pub const QUERY_PARAMETERS: &str = "queryParameters";

/// Message property carrying the per-request status (`success` / `error`)
pub const STATUS: &str = "status";

/// Message property carrying the unique message identifier
pub const MSG_ID: &str = "_msgid";

/// Represents a message flowing between nodes
///
/// A message is a JSON object. Nodes read and rewrite a few well-known
/// properties and pass every other property through untouched.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Message {
    value: Map<String, Value>,
}

impl Message {
    /// Create an empty message
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a message from a JSON value, which must be an object
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        match value {
            Value::Object(map) => Ok(Self { value: map }),
            other => Err(CoreError::SerializationError(format!(
                "message must be a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Create a message carrying only a payload
    pub fn with_payload(payload: impl Into<Value>) -> Self {
        let mut msg = Self::new();
        msg.set_payload(payload);
        msg
    }

    /// Get a property
    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.value.get(key)
    }

    /// Set a property, replacing any previous value
    #[inline]
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.value.insert(key.into(), value.into());
    }

    /// Remove a property
    #[inline]
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.value.remove(key)
    }

    /// The payload, if the property is present at all
    #[inline]
    pub fn payload(&self) -> Option<&Value> {
        self.get(PAYLOAD)
    }

    /// Replace the payload
    #[inline]
    pub fn set_payload(&mut self, payload: impl Into<Value>) {
        self.insert(PAYLOAD, payload);
    }

    /// The query parameters, if present
    #[inline]
    pub fn query_parameters(&self) -> Option<&Value> {
        self.get(QUERY_PARAMETERS)
    }

    /// The request status, if set
    pub fn status(&self) -> Option<&str> {
        self.get(STATUS).and_then(Value::as_str)
    }

    /// Set the request status
    #[inline]
    pub fn set_status(&mut self, status: &str) {
        self.insert(STATUS, status);
    }

    /// The message identifier, if set
    pub fn msg_id(&self) -> Option<&str> {
        self.get(MSG_ID).and_then(Value::as_str)
    }

    /// Return the message identifier, generating one if absent
    pub fn ensure_msg_id(&mut self) -> String {
        if let Some(id) = self.msg_id() {
            return id.to_string();
        }
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.insert(MSG_ID, id.clone());
        id
    }

    /// Borrow the underlying object
    #[inline]
    pub fn as_object(&self) -> &Map<String, Value> {
        &self.value
    }

    /// Take ownership of the message as a JSON value
    #[inline]
    pub fn into_value(self) -> Value {
        Value::Object(self.value)
    }
}

impl From<Map<String, Value>> for Message {
    fn from(value: Map<String, Value>) -> Self {
        Self { value }
    }
}

/// Colour of the status indicator shown next to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFill {
    /// Red
    Red,
    /// Green
    Green,
    /// Yellow
    Yellow,
    /// Blue
    Blue,
    /// Grey
    Grey,
}

/// Shape of the status indicator shown next to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusShape {
    /// Filled dot
    Dot,
    /// Hollow ring
    Ring,
}

/// Operator-facing status of a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    /// Indicator colour
    pub fill: StatusFill,
    /// Indicator shape
    pub shape: StatusShape,
    /// Short label
    pub text: String,
}

impl NodeStatus {
    /// Status shown after a query succeeded
    pub fn success() -> Self {
        Self {
            fill: StatusFill::Blue,
            shape: StatusShape::Dot,
            text: "success".to_string(),
        }
    }

    /// Status shown after a query failed; carries the underlying message
    pub fn error(message: &str) -> Self {
        Self {
            fill: StatusFill::Red,
            shape: StatusShape::Ring,
            text: format!("error: {}", message),
        }
    }
}

/// Human-readable JSON type name, used in error messages
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_from_object() {
        let msg = Message::from_value(json!({"payload": "SELECT 1", "topic": "t"})).unwrap();
        assert_eq!(msg.payload(), Some(&json!("SELECT 1")));
        assert_eq!(msg.get("topic"), Some(&json!("t")));
        assert!(msg.query_parameters().is_none());
    }

    #[test]
    fn test_message_from_non_object_fails() {
        let err = Message::from_value(json!([1, 2])).unwrap_err();
        assert!(matches!(err, CoreError::SerializationError(msg) if msg.contains("array")));
    }

    #[test]
    fn test_missing_payload_differs_from_null_payload() {
        let missing = Message::from_value(json!({})).unwrap();
        let null = Message::from_value(json!({"payload": null})).unwrap();
        assert!(missing.payload().is_none());
        assert_eq!(null.payload(), Some(&Value::Null));
    }

    #[test]
    fn test_ensure_msg_id_is_stable() {
        let mut msg = Message::with_payload("SELECT 1");
        let first = msg.ensure_msg_id();
        let second = msg.ensure_msg_id();
        assert_eq!(first, second);
        assert_eq!(msg.msg_id(), Some(first.as_str()));
    }

    #[test]
    fn test_ensure_msg_id_keeps_existing() {
        let mut msg = Message::from_value(json!({"_msgid": "abc"})).unwrap();
        assert_eq!(msg.ensure_msg_id(), "abc");
    }

    #[test]
    fn test_message_serializes_transparently() {
        let mut msg = Message::with_payload(json!([{"a": 1}]));
        msg.set_status("success");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({"payload": [{"a": 1}], "status": "success"}));
    }

    #[test]
    fn test_node_status_shapes() {
        let ok = NodeStatus::success();
        assert_eq!(ok.fill, StatusFill::Blue);
        assert_eq!(ok.shape, StatusShape::Dot);
        assert_eq!(ok.text, "success");

        let err = NodeStatus::error("connection refused");
        assert_eq!(err.fill, StatusFill::Red);
        assert_eq!(err.shape, StatusShape::Ring);
        assert_eq!(err.text, "error: connection refused");

        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["fill"], "red");
        assert_eq!(value["shape"], "ring");
    }
}
