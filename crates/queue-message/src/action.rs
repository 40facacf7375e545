use serde::{Deserialize, Serialize};

/// The routing tag carried by every [`crate::QueueMessage`].
///
/// Any action other than these four is a protocol error when received on
/// the control-plane topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    NewTask,
    CompletedTask,
    TaskStream,
    SendEvent,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Action::NewTask => "NEW_TASK",
            Action::CompletedTask => "COMPLETED_TASK",
            Action::TaskStream => "TASK_STREAM",
            Action::SendEvent => "SEND_EVENT",
        };
        f.write_str(s)
    }
}
