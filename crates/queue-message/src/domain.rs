use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A workflow service registered with the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub service_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

/// A durable container for an ordered set of tasks and their accumulated state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDefinition {
    #[serde(default = "new_id")]
    pub session_id: String,
    #[serde(default)]
    pub task_ids: Vec<String>,
    #[serde(default)]
    pub state: Map<String, Value>,
}

impl Default for SessionDefinition {
    fn default() -> Self {
        Self {
            session_id: new_id(),
            task_ids: Vec::new(),
            state: Map::new(),
        }
    }
}

/// A single unit of work with an opaque input and a target service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    #[serde(default = "new_id")]
    pub task_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub input: String,
    /// The target service name. Accepted under the legacy `agent_id` alias
    /// on deserialization for compatibility with older workflow services.
    #[serde(alias = "agent_id", default)]
    pub service_id: Option<String>,
}

/// The terminal outcome of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    #[serde(default)]
    pub history: String,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// An intermediate event emitted by a workflow during task execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStream {
    pub task_id: String,
    pub session_id: String,
    pub index: i64,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// An out-of-band event injected into a running task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDefinition {
    pub event_obj_str: String,
    pub service_id: String,
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// The well-known state key under which a task's terminal [`TaskResult`] is stored.
pub fn result_key(task_id: &str) -> String {
    format!("result_{task_id}")
}

/// The well-known state key under which a task's ordered stream records accumulate.
pub fn stream_key(task_id: &str) -> String {
    format!("stream_{task_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_definition_accepts_agent_id_alias() {
        let json = r#"{"task_id":"t1","agent_id":"sum","input":"{}"}"#;
        let task: TaskDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(task.service_id.as_deref(), Some("sum"));
    }

    #[test]
    fn session_default_has_fresh_id_and_empty_tasks() {
        let session = SessionDefinition::default();
        assert!(session.task_ids.is_empty());
        assert!(!session.session_id.is_empty());
    }

    #[test]
    fn result_and_stream_keys_are_namespaced() {
        assert_eq!(result_key("t1"), "result_t1");
        assert_eq!(stream_key("t1"), "stream_t1");
    }
}
