use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use queue_message::{stream_key, EventDefinition, TaskDefinition, TaskResult, TaskStream};
use serde_json::Value;

use crate::app::ControlPlane;
use crate::error::ControlPlaneError;

pub async fn add_task_to_session(
    State(app): State<Arc<ControlPlane>>,
    Path(session_id): Path<String>,
    Json(task_def): Json<TaskDefinition>,
) -> Result<Json<String>, ControlPlaneError> {
    Ok(Json(app.add_task_to_session(&session_id, task_def).await?))
}

pub async fn get_session_tasks(
    State(app): State<Arc<ControlPlane>>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<TaskDefinition>>, ControlPlaneError> {
    Ok(Json(app.get_session_tasks(&session_id).await?))
}

pub async fn get_current_task(
    State(app): State<Arc<ControlPlane>>,
    Path(session_id): Path<String>,
) -> Result<Json<Option<TaskDefinition>>, ControlPlaneError> {
    Ok(Json(app.get_current_task(&session_id).await?))
}

pub async fn get_task_result(
    State(app): State<Arc<ControlPlane>>,
    Path((session_id, task_id)): Path<(String, String)>,
) -> Result<Json<Option<TaskResult>>, ControlPlaneError> {
    Ok(Json(app.get_task_result(&task_id, &session_id).await?))
}

pub async fn send_event(
    State(app): State<Arc<ControlPlane>>,
    Path((session_id, task_id)): Path<(String, String)>,
    Json(event_def): Json<EventDefinition>,
) -> Result<Json<Value>, ControlPlaneError> {
    app.send_event(&session_id, &task_id, event_def).await?;
    Ok(Json(Value::Null))
}

/// Streams a task's accumulated `TASK_STREAM` records as newline-delimited
/// JSON, polling the session every `step_interval` until a terminal
/// `TaskResult` lands. Mirrors the source's async generator: sorted by
/// index, previously-yielded records never repeat.
pub async fn get_task_result_stream(
    State(app): State<Arc<ControlPlane>>,
    Path((session_id, task_id)): Path<(String, String)>,
) -> Result<Response, ControlPlaneError> {
    let session = app.get_session(&session_id).await?;
    let key = stream_key(&task_id);
    if !session.state.contains_key(&key) {
        return Err(ControlPlaneError::NotFound("task stream not found".into()));
    }

    let state = StreamState {
        app,
        session_id,
        task_id,
        last_index: 0,
        pending: VecDeque::new(),
        finished: false,
    };

    let stream = futures::stream::unfold(state, next_ndjson_line);
    let body = Body::from_stream(stream);

    Ok(Response::builder()
        .header(axum::http::header::CONTENT_TYPE, "application/x-ndjson")
        .body(body)
        .expect("static response parts are always valid"))
}

struct StreamState {
    app: Arc<ControlPlane>,
    session_id: String,
    task_id: String,
    last_index: usize,
    pending: VecDeque<Bytes>,
    finished: bool,
}

async fn next_ndjson_line(mut state: StreamState) -> Option<(Result<Bytes, Infallible>, StreamState)> {
    loop {
        if let Some(line) = state.pending.pop_front() {
            return Some((Ok(line), state));
        }
        if state.finished {
            return None;
        }

        let session = match state.app.get_session(&state.session_id).await {
            Ok(session) => session,
            Err(err) => {
                tracing::error!(session_id = %state.session_id, task_id = %state.task_id, error = %err, "error in task result stream");
                state.pending.push_back(error_line(&err));
                state.finished = true;
                continue;
            }
        };

        let key = stream_key(&state.task_id);
        let raw_records = match session.state.get(&key) {
            Some(Value::Array(values)) => values.clone(),
            _ => Vec::new(),
        };

        let mut new_records: Vec<TaskStream> = raw_records
            .into_iter()
            .skip(state.last_index)
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect();
        new_records.sort_by_key(|record| record.index);

        state.last_index += new_records.len();
        for record in &new_records {
            let mut line = serde_json::to_vec(&record.data).unwrap_or_default();
            line.push(b'\n');
            state.pending.push_back(Bytes::from(line));
        }

        match state.app.get_task_result(&state.task_id, &state.session_id).await {
            Ok(Some(_)) => state.finished = true,
            Ok(None) => {
                if state.pending.is_empty() {
                    tokio::time::sleep(Duration::from_secs_f64(state.app.config.step_interval.max(0.0))).await;
                }
            }
            Err(err) => {
                tracing::error!(session_id = %state.session_id, task_id = %state.task_id, error = %err, "error in task result stream");
                state.pending.push_back(error_line(&err));
                state.finished = true;
            }
        }
    }
}

fn error_line(err: &ControlPlaneError) -> Bytes {
    let mut line = serde_json::to_vec(&serde_json::json!({ "error": err.to_string() })).unwrap_or_default();
    line.push(b'\n');
    Bytes::from(line)
}
