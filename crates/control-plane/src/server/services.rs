use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use queue_message::ServiceDefinition;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::app::ControlPlane;
use crate::config::ControlPlaneConfig;
use crate::error::ControlPlaneError;

pub async fn register_service(
    State(app): State<Arc<ControlPlane>>,
    Json(service): Json<ServiceDefinition>,
) -> Result<Json<ControlPlaneConfig>, ControlPlaneError> {
    app.register_service(service).await?;
    Ok(Json(app.config.clone()))
}

#[derive(Deserialize)]
pub struct DeregisterServiceQuery {
    service_name: String,
}

/// `service_name` arrives as a query parameter, not a JSON body — the
/// source's route handler takes a bare `str` argument, which FastAPI binds
/// from the query string on a route with no path parameter of that name.
pub async fn deregister_service(
    State(app): State<Arc<ControlPlane>>,
    Query(query): Query<DeregisterServiceQuery>,
) -> Result<Json<Value>, ControlPlaneError> {
    app.deregister_service(&query.service_name).await?;
    Ok(Json(Value::Null))
}

pub async fn get_service(
    State(app): State<Arc<ControlPlane>>,
    Path(service_name): Path<String>,
) -> Result<Json<ServiceDefinition>, ControlPlaneError> {
    Ok(Json(app.get_service(&service_name).await?))
}

pub async fn get_all_services(
    State(app): State<Arc<ControlPlane>>,
) -> Result<Json<Map<String, Value>>, ControlPlaneError> {
    Ok(Json(app.get_all_services().await?))
}
