use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use queue_message::SessionDefinition;
use serde_json::{Map, Value};

use crate::app::ControlPlane;
use crate::error::ControlPlaneError;

pub async fn create_session(State(app): State<Arc<ControlPlane>>) -> Result<Json<String>, ControlPlaneError> {
    Ok(Json(app.create_session().await?))
}

pub async fn get_session(
    State(app): State<Arc<ControlPlane>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionDefinition>, ControlPlaneError> {
    Ok(Json(app.get_session(&session_id).await?))
}

pub async fn delete_session(
    State(app): State<Arc<ControlPlane>>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ControlPlaneError> {
    app.delete_session(&session_id).await?;
    Ok(Json(Value::Null))
}

pub async fn get_all_sessions(
    State(app): State<Arc<ControlPlane>>,
) -> Result<Json<Map<String, Value>>, ControlPlaneError> {
    Ok(Json(app.get_all_sessions().await?))
}

pub async fn get_session_state(
    State(app): State<Arc<ControlPlane>>,
    Path(session_id): Path<String>,
) -> Result<Json<Map<String, Value>>, ControlPlaneError> {
    Ok(Json(app.get_session_state(&session_id).await?))
}

pub async fn update_session_state(
    State(app): State<Arc<ControlPlane>>,
    Path(session_id): Path<String>,
    Json(state): Json<Map<String, Value>>,
) -> Result<Json<Value>, ControlPlaneError> {
    app.update_session_state(&session_id, state).await?;
    Ok(Json(Value::Null))
}
