use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::action::Action;
use crate::domain::new_id;

/// The wire envelope for all inter-component traffic. Immutable once published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMessage {
    #[serde(default = "new_id")]
    pub id: String,
    #[serde(default)]
    pub publisher_id: String,
    /// The routing tag: a service name, or `"control_plane"`.
    #[serde(rename = "type")]
    pub message_type: String,
    pub action: Action,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub stats: Map<String, Value>,
}

impl QueueMessage {
    pub fn new(message_type: impl Into<String>, action: Action, data: Map<String, Value>) -> Self {
        Self {
            id: new_id(),
            publisher_id: String::new(),
            message_type: message_type.into(),
            action,
            data,
            stats: Map::new(),
        }
    }

    /// Deserializes `self.data` into a concrete payload type.
    pub fn decode_data<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.data.clone()))
    }
}
