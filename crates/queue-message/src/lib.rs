//! The wire envelope, routing-tag enum, topic scheme and domain types shared
//! by the control plane and workflow services.

mod action;
mod domain;
mod message;
mod topic;

pub use action::Action;
pub use domain::{
    result_key, stream_key, EventDefinition, ServiceDefinition, SessionDefinition, TaskDefinition,
    TaskResult, TaskStream,
};
pub use message::QueueMessage;
pub use topic::{is_valid_topic, topic};

/// The reserved message type identifying the control plane's own topic.
pub const CONTROL_PLANE_MESSAGE_TYPE: &str = "control_plane";
