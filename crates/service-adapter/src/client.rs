use control_plane::config::ControlPlaneConfig;
use message_queue::QueueConfig;
use queue_message::ServiceDefinition;
use serde_json::{Map, Value};

use crate::error::Error;

/// The registration protocol a workflow service follows against the
/// control plane (spec §4.5):
///
/// 1. `fetch_queue_config` — learn the broker configuration.
/// 2. connect to the broker using that config (left to the caller; this
///    crate only carries the [`QueueConfig`] back, it does not construct a
///    [`message_queue::MessageQueue`] itself).
/// 3. `register` — upsert this service, learn `topic_namespace`.
/// 4. subscribe to `<namespace>.<service_name>` (left to the caller).
/// 5. on shutdown, `deregister`.
pub struct ServiceClient {
    service: ServiceDefinition,
    control_plane_url: Option<String>,
    http: reqwest::Client,
    topic_namespace: std::sync::Mutex<Option<String>>,
}

impl ServiceClient {
    pub fn new(
        service_name: impl Into<String>,
        description: impl Into<String>,
        host: impl Into<String>,
        port: Option<u16>,
        control_plane_url: Option<String>,
    ) -> Self {
        Self {
            service: ServiceDefinition {
                service_name: service_name.into(),
                description: description.into(),
                host: host.into(),
                port,
            },
            control_plane_url,
            http: reqwest::Client::new(),
            topic_namespace: std::sync::Mutex::new(None),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service.service_name
    }

    fn base_url(&self) -> Option<&str> {
        self.control_plane_url.as_deref()
    }

    /// `GET /queue_config` — the bootstrap handshake so this service can
    /// connect to the same broker the control plane uses, with no prior
    /// knowledge of which back-end was picked.
    pub async fn fetch_queue_config(&self) -> Result<QueueConfig, Error> {
        let Some(base) = self.base_url() else {
            return Err(Error::Response {
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                body: "no control plane url configured".into(),
            });
        };
        let response = self.http.get(format!("{base}/queue_config")).send().await?;
        decode(response).await
    }

    /// `POST /services/register` with this service's [`ServiceDefinition`].
    /// The returned [`ControlPlaneConfig`] carries `topic_namespace`, which
    /// both sides must agree on when computing topic names; it is cached so
    /// [`Self::topic`] can be used afterward.
    pub async fn register(&self) -> Result<ControlPlaneConfig, Error> {
        let Some(base) = self.base_url() else {
            return Err(Error::Response {
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                body: "no control plane url configured".into(),
            });
        };
        let response = self
            .http
            .post(format!("{base}/services/register"))
            .json(&self.service)
            .send()
            .await?;
        let config: ControlPlaneConfig = decode(response).await?;
        *self.topic_namespace.lock().expect("lock poisoned") = Some(config.topic_namespace.clone());
        Ok(config)
    }

    /// `POST /services/deregister?service_name=...`.
    pub async fn deregister(&self) -> Result<(), Error> {
        let Some(base) = self.base_url() else {
            return Ok(());
        };
        let response = self
            .http
            .post(format!("{base}/services/deregister"))
            .query(&[("service_name", self.service.service_name.as_str())])
            .send()
            .await?;
        response.error_for_status().map_err(Error::Transport)?;
        Ok(())
    }

    /// `GET /sessions/{sid}/state`. Returns `None` on any transport-level
    /// connection failure — a soft-fail, since a workflow service may run
    /// without a reachable control plane for local testing (spec §4.5) —
    /// and also on a 404 (unknown or deleted session), since the error
    /// body is itself a JSON object and would otherwise decode as if it
    /// were session state.
    pub async fn get_session_state(&self, session_id: &str) -> Option<Map<String, Value>> {
        let base = self.base_url()?;
        let response = match self
            .http
            .get(format!("{base}/sessions/{session_id}/state"))
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(session_id, error = %err, "control plane unreachable, returning no session state");
                return None;
            }
        };
        if !response.status().is_success() {
            tracing::debug!(session_id, status = %response.status(), "control plane returned an error, returning no session state");
            return None;
        }
        response.json().await.ok()
    }

    /// `POST /sessions/{sid}/state`. A silent no-op when no control-plane
    /// URL is configured (spec §4.5).
    pub async fn update_session_state(&self, session_id: &str, state: Map<String, Value>) -> Result<(), Error> {
        let Some(base) = self.base_url() else {
            return Ok(());
        };
        let response = self
            .http
            .post(format!("{base}/sessions/{session_id}/state"))
            .json(&state)
            .send()
            .await?;
        response.error_for_status().map_err(Error::Transport)?;
        Ok(())
    }

    /// The fully qualified topic for `message_type`, once `register` has
    /// cached a `topic_namespace`. Panics if called before a successful
    /// `register` — a service cannot compute topics without first agreeing
    /// on the namespace with the control plane.
    pub fn topic(&self, message_type: &str) -> String {
        let namespace = self.topic_namespace.lock().expect("lock poisoned");
        let namespace = namespace
            .as_deref()
            .expect("topic() called before a successful register()");
        queue_message::topic(namespace, message_type)
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, Error> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Response { status, body });
    }
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
