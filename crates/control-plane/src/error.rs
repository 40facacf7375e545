use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// The control plane's error kinds, mapped to HTTP status per spec §7.
#[derive(Debug, thiserror::Error)]
pub enum ControlPlaneError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("routing error: {0}")]
    Routing(String),

    #[error("message queue transport error: {0}")]
    Transport(#[from] message_queue::Error),

    #[error("state store error: {0}")]
    StateStore(#[from] state_store::Error),

    #[error("malformed JSON payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ControlPlaneError {
    fn into_response(self) -> Response {
        let status = match &self {
            ControlPlaneError::NotFound(_) => StatusCode::NOT_FOUND,
            ControlPlaneError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ControlPlaneError::Conflict(_) => StatusCode::CONFLICT,
            ControlPlaneError::Protocol(_) => StatusCode::BAD_REQUEST,
            ControlPlaneError::Routing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ControlPlaneError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ControlPlaneError::StateStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ControlPlaneError::Serialization(_) => StatusCode::BAD_REQUEST,
            ControlPlaneError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "control plane responding with internal error");
        }

        (status, axum::Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let resp = ControlPlaneError::NotFound("session".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn bad_request_maps_to_400() {
        let resp = ControlPlaneError::BadRequest("mismatch".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn routing_error_maps_to_500() {
        let resp = ControlPlaneError::Routing("no service_id".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
