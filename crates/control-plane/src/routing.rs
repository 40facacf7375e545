//! Session/task state management and the routing, completion and stream
//! ingestion algorithms. HTTP handlers in `server/` are thin wrappers over
//! the methods here; the consumer loop in `consumer.rs` dispatches bus
//! messages into the same methods.

use queue_message::{
    result_key, stream_key, Action, EventDefinition, QueueMessage, ServiceDefinition,
    SessionDefinition, TaskDefinition, TaskResult, TaskStream,
};
use serde_json::{Map, Value};
use state_store::{SERVICES_COLLECTION, SESSIONS_COLLECTION, TASKS_COLLECTION};

use crate::app::ControlPlane;
use crate::error::ControlPlaneError;

impl ControlPlane {
    pub async fn register_service(&self, service: ServiceDefinition) -> Result<(), ControlPlaneError> {
        self.state_store
            .aput(&service.service_name, serde_json::to_value(&service)?, SERVICES_COLLECTION)
            .await?;
        Ok(())
    }

    pub async fn deregister_service(&self, service_name: &str) -> Result<(), ControlPlaneError> {
        self.state_store.adelete(service_name, SERVICES_COLLECTION).await?;
        Ok(())
    }

    pub async fn get_service(&self, service_name: &str) -> Result<ServiceDefinition, ControlPlaneError> {
        let value = self
            .state_store
            .aget(service_name, SERVICES_COLLECTION)
            .await?
            .ok_or_else(|| ControlPlaneError::NotFound("service not found".into()))?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get_all_services(&self) -> Result<Map<String, Value>, ControlPlaneError> {
        let all = self.state_store.aget_all(SERVICES_COLLECTION).await?;
        Ok(all.into_iter().collect())
    }

    pub async fn create_session(&self) -> Result<String, ControlPlaneError> {
        let session = SessionDefinition::default();
        self.state_store
            .aput(&session.session_id, serde_json::to_value(&session)?, SESSIONS_COLLECTION)
            .await?;
        Ok(session.session_id)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<SessionDefinition, ControlPlaneError> {
        let value = self
            .state_store
            .aget(session_id, SESSIONS_COLLECTION)
            .await?
            .ok_or_else(|| ControlPlaneError::NotFound("session not found".into()))?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<(), ControlPlaneError> {
        self.state_store.adelete(session_id, SESSIONS_COLLECTION).await?;
        Ok(())
    }

    pub async fn get_all_sessions(&self) -> Result<Map<String, Value>, ControlPlaneError> {
        let all = self.state_store.aget_all(SESSIONS_COLLECTION).await?;
        Ok(all.into_iter().collect())
    }

    pub async fn get_task(&self, task_id: &str) -> Result<TaskDefinition, ControlPlaneError> {
        let value = self
            .state_store
            .aget(task_id, TASKS_COLLECTION)
            .await?
            .ok_or_else(|| ControlPlaneError::NotFound("task not found".into()))?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get_session_tasks(&self, session_id: &str) -> Result<Vec<TaskDefinition>, ControlPlaneError> {
        let session = self.get_session(session_id).await?;
        let mut tasks = Vec::with_capacity(session.task_ids.len());
        for task_id in &session.task_ids {
            tasks.push(self.get_task(task_id).await?);
        }
        Ok(tasks)
    }

    pub async fn get_current_task(&self, session_id: &str) -> Result<Option<TaskDefinition>, ControlPlaneError> {
        let session = self.get_session(session_id).await?;
        match session.task_ids.last() {
            Some(task_id) => Ok(Some(self.get_task(task_id).await?)),
            None => Ok(None),
        }
    }

    /// Appends `task_def` to `session_id`'s task list, persists the task,
    /// then routes it to its destination service. Serialized per-session
    /// via the write lock so two concurrent appends can't race on the
    /// session's `task_ids`.
    pub async fn add_task_to_session(
        &self,
        session_id: &str,
        mut task_def: TaskDefinition,
    ) -> Result<String, ControlPlaneError> {
        let lock = self.lock_session(session_id).await;
        let _guard = lock.lock().await;

        let mut session = self.get_session(session_id).await?;

        match &task_def.session_id {
            None => task_def.session_id = Some(session_id.to_string()),
            Some(declared) if declared != session_id => {
                return Err(ControlPlaneError::BadRequest(format!(
                    "wrong task definition: task.session_id is {declared} but should be {session_id}"
                )))
            }
            Some(_) => {}
        }

        session.task_ids.push(task_def.task_id.clone());
        self.state_store
            .aput(session_id, serde_json::to_value(&session)?, SESSIONS_COLLECTION)
            .await?;

        self.state_store
            .aput(&task_def.task_id, serde_json::to_value(&task_def)?, TASKS_COLLECTION)
            .await?;

        let task_def = self.send_task_to_service(task_def).await?;
        Ok(task_def.task_id)
    }

    /// Determines the next hop(s) for `task_def` and publishes them,
    /// folding any state delta the routing decision produced back into
    /// the session. A task whose result is already recorded routes to
    /// nowhere (this is also why the completion path's second call below
    /// is a no-op once the result lands).
    pub async fn send_task_to_service(&self, task_def: TaskDefinition) -> Result<TaskDefinition, ControlPlaneError> {
        let session_id = task_def
            .session_id
            .clone()
            .ok_or_else(|| ControlPlaneError::Routing(format!("task {} has no session", task_def.task_id)))?;

        let mut session = self.get_session(&session_id).await?;

        let (next_messages, state_delta) = get_next_messages(&task_def, session.state.clone())?;

        tracing::debug!(task_id = %task_def.task_id, count = next_messages.len(), "routing task to services");

        for message in next_messages {
            self.publish(message).await?;
        }

        session.state.extend(state_delta);
        self.state_store
            .aput(&session_id, serde_json::to_value(&session)?, SESSIONS_COLLECTION)
            .await?;

        Ok(task_def)
    }

    /// Records a service's result against the owning session's state, then
    /// re-routes the originating task. The re-route is a no-op now that the
    /// result is recorded, but is kept so a future multi-hop routing rule
    /// can chain a next destination off this same completion.
    pub async fn handle_service_completion(&self, task_result: TaskResult) -> Result<(), ControlPlaneError> {
        let task_def = self.get_task(&task_result.task_id).await?;
        let session_id = task_def
            .session_id
            .clone()
            .ok_or_else(|| ControlPlaneError::Routing(format!("task {} has no session", task_def.task_id)))?;

        let lock = self.lock_session(&session_id).await;
        let _guard = lock.lock().await;

        let mut session = self.get_session(&session_id).await?;
        let state_delta = add_result_to_state(&task_result, session.state.clone())?;
        session.state.extend(state_delta);
        self.state_store
            .aput(&session_id, serde_json::to_value(&session)?, SESSIONS_COLLECTION)
            .await?;

        let task_def = self.send_task_to_service(task_def).await?;
        self.state_store
            .aput(&task_def.task_id, serde_json::to_value(&task_def)?, TASKS_COLLECTION)
            .await?;

        Ok(())
    }

    pub async fn get_task_result(&self, task_id: &str, session_id: &str) -> Result<Option<TaskResult>, ControlPlaneError> {
        let session = self.get_session(session_id).await?;
        let key = result_key(task_id);
        let Some(raw) = session.state.get(&key) else {
            return Ok(None);
        };

        let result: TaskResult = serde_json::from_value(raw.clone())?;
        if result.task_id != task_id {
            tracing::debug!(task_id, "retrieved result did not match requested task_id");
            return Ok(None);
        }
        Ok(Some(result))
    }

    /// Appends a stream record to the session's accumulated stream for this
    /// task. Serialized per-session: concurrent `TASK_STREAM` deliveries for
    /// the same task must not clobber one another's append.
    pub async fn add_stream_to_session(&self, task_stream: TaskStream) -> Result<(), ControlPlaneError> {
        let lock = self.lock_session(&task_stream.session_id).await;
        let _guard = lock.lock().await;

        let mut session = self.get_session(&task_stream.session_id).await?;
        let key = stream_key(&task_stream.task_id);

        let mut existing: Vec<Value> = match session.state.get(&key) {
            Some(Value::Array(values)) => values.clone(),
            _ => Vec::new(),
        };
        existing.push(serde_json::to_value(&task_stream)?);
        session.state.insert(key, Value::Array(existing));

        self.state_store
            .aput(&task_stream.session_id, serde_json::to_value(&session)?, SESSIONS_COLLECTION)
            .await?;
        Ok(())
    }

    pub async fn send_event(
        &self,
        session_id: &str,
        task_id: &str,
        event_def: EventDefinition,
    ) -> Result<(), ControlPlaneError> {
        let task_def = TaskDefinition {
            task_id: task_id.to_string(),
            session_id: Some(session_id.to_string()),
            input: event_def.event_obj_str.clone(),
            service_id: Some(event_def.service_id.clone()),
        };
        let message = QueueMessage::new(
            event_def.service_id.clone(),
            Action::SendEvent,
            serde_json::to_value(&task_def)?
                .as_object()
                .cloned()
                .unwrap_or_default(),
        );
        self.publish(message).await?;
        Ok(())
    }

    pub async fn get_session_state(&self, session_id: &str) -> Result<Map<String, Value>, ControlPlaneError> {
        Ok(self.get_session(session_id).await?.state)
    }

    pub async fn update_session_state(
        &self,
        session_id: &str,
        state: Map<String, Value>,
    ) -> Result<(), ControlPlaneError> {
        let lock = self.lock_session(session_id).await;
        let _guard = lock.lock().await;

        let mut session = self.get_session(session_id).await?;
        session.state.extend(state);
        self.state_store
            .aput(session_id, serde_json::to_value(&session)?, SESSIONS_COLLECTION)
            .await?;
        Ok(())
    }

    pub fn get_message_queue_config(&self) -> message_queue::QueueConfig {
        self.message_queue.as_config()
    }

    /// Stamps `message.publisher_id` and publishes to the topic derived
    /// from the message's own `type` field.
    pub async fn publish(&self, mut message: QueueMessage) -> Result<(), ControlPlaneError> {
        message.publisher_id = self.publisher_id.clone();
        let topic = self.topic(&message.message_type);
        self.message_queue.publish(message, &topic, true, None).await?;
        Ok(())
    }
}

/// Decides the next hop(s) for `task_def` given the session's current
/// state. A task whose result already landed in `state` routes nowhere.
/// Otherwise it routes once, to `task_def.service_id`.
fn get_next_messages(
    task_def: &TaskDefinition,
    mut state: Map<String, Value>,
) -> Result<(Vec<QueueMessage>, Map<String, Value>), ControlPlaneError> {
    let service_id = task_def.service_id.clone().ok_or_else(|| {
        ControlPlaneError::Routing(format!(
            "task {} must have a service_id to identify a destination service",
            task_def.task_id
        ))
    })?;

    state.entry(task_def.task_id.clone()).or_insert_with(|| Value::Object(Map::new()));

    if state.get(&result_key(&task_def.task_id)).is_some() {
        return Ok((Vec::new(), state));
    }

    let message = QueueMessage::new(
        service_id,
        Action::NewTask,
        serde_json::to_value(task_def)?.as_object().cloned().unwrap_or_default(),
    );

    Ok((vec![message], state))
}

/// Folds a completed task's result into session state, bumping the
/// `retries` counter (a count of completions recorded against the task,
/// not yet used to cap retry attempts).
fn add_result_to_state(
    result: &TaskResult,
    mut state: Map<String, Value>,
) -> Result<Map<String, Value>, ControlPlaneError> {
    let retries = state.get("retries").and_then(Value::as_i64).unwrap_or(-1) + 1;
    state.insert("retries".to_string(), Value::from(retries));
    state.insert(result_key(&result.task_id), serde_json::to_value(result)?);
    Ok(state)
}
