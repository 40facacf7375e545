use std::sync::Arc;

use control_plane::config::ControlPlaneConfig;
use control_plane::ControlPlane;
use message_queue::backends::InProcessMessageQueue;
use message_queue::MessageQueue;
use tokio_util::sync::CancellationToken;

/// A running control plane, bound to an ephemeral port, with its own
/// consumer loop draining `<ns>.control_plane`. Dropping this struct
/// cancels the consumer; the HTTP server task is detached and outlives the
/// test process harmlessly (it is killed when the test binary exits).
pub struct Harness {
    pub base_url: String,
    pub app: Arc<ControlPlane>,
    cancellation: CancellationToken,
}

impl Harness {
    pub async fn spawn() -> Self {
        Self::spawn_with_namespace("llama_deploy").await
    }

    pub async fn spawn_with_namespace(namespace: &str) -> Self {
        let config = ControlPlaneConfig {
            topic_namespace: namespace.to_string(),
            ..ControlPlaneConfig::default()
        };
        let message_queue: Arc<dyn MessageQueue> = Arc::new(InProcessMessageQueue::new());
        let app = ControlPlane::new(config, message_queue, None).unwrap();

        let cancellation = CancellationToken::new();
        tokio::spawn(control_plane::run_consumer(app.clone(), cancellation.clone()));

        let router = control_plane::build_router(app.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Self {
            base_url: format!("http://{addr}"),
            app,
            cancellation,
        }
    }

    pub fn client(&self) -> reqwest::Client {
        reqwest::Client::new()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

/// Publishes `message` directly on `<ns>.<message.type>`, bypassing HTTP —
/// used to simulate a workflow service replying on the bus.
pub async fn publish_from_service(harness: &Harness, message: queue_message::QueueMessage) {
    harness.app.publish(message).await.unwrap();
}

/// Gives the background consumer loop a moment to drain a just-published
/// message before the test asserts on its effect.
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
}
