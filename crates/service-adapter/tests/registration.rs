use std::sync::Arc;

use control_plane::config::ControlPlaneConfig;
use control_plane::ControlPlane;
use message_queue::backends::InProcessMessageQueue;
use message_queue::MessageQueue;
use service_adapter::ServiceClient;

async fn spawn_control_plane() -> String {
    let config = ControlPlaneConfig {
        internal_port: Some(0),
        ..ControlPlaneConfig::default()
    };
    let message_queue: Arc<dyn MessageQueue> = Arc::new(InProcessMessageQueue::new());
    let app = ControlPlane::new(config, message_queue, None).unwrap();
    let router = control_plane::build_router(app);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn register_then_fetch_queue_config() {
    let base_url = spawn_control_plane().await;
    let client = ServiceClient::new("sum", "adds two numbers", "127.0.0.1", Some(9100), Some(base_url));

    let config = client.register().await.unwrap();
    assert_eq!(config.topic_namespace, "llama_deploy");
    assert_eq!(client.topic("control_plane"), "llama_deploy.control_plane");

    let queue_config = client.fetch_queue_config().await.unwrap();
    assert!(matches!(queue_config, message_queue::QueueConfig::Simple { .. }));
}

#[tokio::test]
async fn deregister_then_fetch_service_is_absent() {
    let base_url = spawn_control_plane().await;
    let client = ServiceClient::new("sum", "", "127.0.0.1", None, Some(base_url.clone()));

    client.register().await.unwrap();
    client.deregister().await.unwrap();

    let http = reqwest::Client::new();
    let response = http.get(format!("{base_url}/services/sum")).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn session_state_round_trips_through_update_and_get() {
    let base_url = spawn_control_plane().await;
    let client = ServiceClient::new("sum", "", "127.0.0.1", None, Some(base_url.clone()));

    let http = reqwest::Client::new();
    let session_id: String = http
        .post(format!("{base_url}/sessions/create"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let mut state = serde_json::Map::new();
    state.insert("k".into(), serde_json::Value::String("v".into()));
    client.update_session_state(&session_id, state).await.unwrap();

    let got = client.get_session_state(&session_id).await.unwrap();
    assert_eq!(got.get("k"), Some(&serde_json::Value::String("v".into())));
}

#[tokio::test]
async fn get_session_state_is_none_when_control_plane_unreachable() {
    let client = ServiceClient::new(
        "sum",
        "",
        "127.0.0.1",
        None,
        Some("http://127.0.0.1:1".to_string()),
    );
    assert!(client.get_session_state("s1").await.is_none());
}

#[tokio::test]
async fn get_session_state_is_none_for_unknown_session() {
    let base_url = spawn_control_plane().await;
    let client = ServiceClient::new("sum", "", "127.0.0.1", None, Some(base_url));

    // No session with this id was ever created; the control plane answers
    // 404 with a JSON error body, which must not be mistaken for state.
    assert!(client.get_session_state("no-such-session").await.is_none());
}
