//! The control plane's Axum HTTP API (spec §6).

mod services;
mod sessions;
mod tasks;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use serde_json::{Map, Value};

use crate::app::ControlPlane;

/// Builds the router over a constructed [`ControlPlane`]. CORS is only
/// attached when `cors_origins` is non-empty, matching the source, which
/// skips the middleware entirely rather than installing a deny-all policy.
pub fn build_router(app: Arc<ControlPlane>) -> Router {
    let router = Router::new()
        .route("/", get(home))
        .route("/queue_config", get(queue_config))
        .route("/services/register", post(services::register_service))
        .route("/services/deregister", post(services::deregister_service))
        .route("/services/{service_name}", get(services::get_service))
        .route("/services", get(services::get_all_services))
        .route("/sessions/create", post(sessions::create_session))
        .route("/sessions/{session_id}", get(sessions::get_session))
        .route("/sessions/{session_id}/delete", post(sessions::delete_session))
        .route("/sessions", get(sessions::get_all_sessions))
        .route(
            "/sessions/{session_id}/tasks",
            post(tasks::add_task_to_session).get(tasks::get_session_tasks),
        )
        .route("/sessions/{session_id}/current_task", get(tasks::get_current_task))
        .route("/sessions/{session_id}/tasks/{task_id}/result", get(tasks::get_task_result))
        .route(
            "/sessions/{session_id}/tasks/{task_id}/result_stream",
            get(tasks::get_task_result_stream),
        )
        .route("/sessions/{session_id}/tasks/{task_id}/send_event", post(tasks::send_event))
        .route(
            "/sessions/{session_id}/state",
            get(sessions::get_session_state).post(sessions::update_session_state),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(app.clone());

    if app.config.cors_origins.is_empty() {
        router
    } else {
        let origins = app
            .config
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect::<Vec<_>>();

        router.layer(
            tower_http::cors::CorsLayer::new()
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any)
                .allow_origin(origins),
        )
    }
}

async fn home(axum::extract::State(app): axum::extract::State<Arc<ControlPlane>>) -> axum::Json<Map<String, Value>> {
    let mut body = Map::new();
    body.insert("running".into(), Value::String(app.config.running.to_string()));
    body.insert("step_interval".into(), Value::String(app.config.step_interval.to_string()));
    body.insert("services_store_key".into(), Value::String(app.config.services_store_key.clone()));
    body.insert("tasks_store_key".into(), Value::String(app.config.tasks_store_key.clone()));
    body.insert("session_store_key".into(), Value::String(app.config.session_store_key.clone()));
    axum::Json(body)
}

async fn queue_config(
    axum::extract::State(app): axum::extract::State<Arc<ControlPlane>>,
) -> axum::Json<message_queue::QueueConfig> {
    axum::Json(app.get_message_queue_config())
}
