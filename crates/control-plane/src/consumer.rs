//! The control plane's own bus consumer: drains its `control_plane` topic
//! and dispatches each message to the matching routing/completion/stream
//! method. Runs for the life of the process, cancelled via a
//! `CancellationToken` from `main` alongside the HTTP server's graceful
//! shutdown.

use std::sync::Arc;

use futures::StreamExt;
use queue_message::{Action, QueueMessage, TaskDefinition, TaskResult, TaskStream};
use tokio_util::sync::CancellationToken;

use crate::app::ControlPlane;

/// Consumes `app.topic(CONTROL_PLANE_MESSAGE_TYPE)` until `cancellation` is
/// triggered. A malformed or unsupported message logs an error and is
/// dropped; it never takes the loop down, since one bad message from one
/// misbehaving service shouldn't stall routing for every other session.
pub async fn run(app: Arc<ControlPlane>, cancellation: CancellationToken) {
    let topic = app.topic(queue_message::CONTROL_PLANE_MESSAGE_TYPE);
    let mut messages = app.message_queue.get_messages(&topic);

    loop {
        tokio::select! {
            _ = cancellation.cancelled() => {
                tracing::info!("control plane consumer loop shutting down");
                return;
            }
            message = messages.next() => {
                match message {
                    Some(message) => dispatch(&app, message).await,
                    None => {
                        tracing::warn!("control plane message stream ended");
                        return;
                    }
                }
            }
        }
    }
}

async fn dispatch(app: &ControlPlane, message: QueueMessage) {
    if message.data.is_empty() {
        tracing::error!(message_id = %message.id, "invalid field 'data' in queue message");
        return;
    }

    let result = match message.action {
        Action::NewTask => dispatch_new_task(app, &message).await,
        Action::CompletedTask => dispatch_completed_task(app, &message).await,
        Action::TaskStream => dispatch_task_stream(app, &message).await,
        Action::SendEvent => {
            tracing::error!(action = %message.action, "action not supported by control plane");
            return;
        }
    };

    if let Err(err) = result {
        tracing::error!(message_id = %message.id, error = %err, "failed to process queue message");
    }
}

async fn dispatch_new_task(app: &ControlPlane, message: &QueueMessage) -> Result<(), crate::error::ControlPlaneError> {
    let mut task_def: TaskDefinition = message.decode_data()?;
    let session_id = match task_def.session_id.clone() {
        Some(session_id) => session_id,
        None => {
            let session_id = app.create_session().await?;
            task_def.session_id = Some(session_id.clone());
            session_id
        }
    };
    app.add_task_to_session(&session_id, task_def).await?;
    Ok(())
}

async fn dispatch_completed_task(app: &ControlPlane, message: &QueueMessage) -> Result<(), crate::error::ControlPlaneError> {
    let task_result: TaskResult = message.decode_data()?;
    app.handle_service_completion(task_result).await
}

async fn dispatch_task_stream(app: &ControlPlane, message: &QueueMessage) -> Result<(), crate::error::ControlPlaneError> {
    let task_stream: TaskStream = message.decode_data()?;
    app.add_stream_to_session(task_stream).await
}
