use clap::Parser;
use serde::{Deserialize, Serialize};

/// The control plane's configuration surface. Every field is settable by
/// flag or by the matching `CONTROL_PLANE_*` environment variable, and the
/// whole struct is handed back to a registering service as the response
/// body of `POST /services/register` so it can derive a matching
/// `ServiceClient`.
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "control-plane", about = "Workflow orchestration control plane")]
pub struct ControlPlaneConfig {
    #[arg(long, env = "CONTROL_PLANE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "CONTROL_PLANE_PORT", default_value_t = 8000)]
    pub port: u16,

    /// When set, takes precedence over `host` for where the server binds.
    #[arg(long, env = "CONTROL_PLANE_INTERNAL_HOST")]
    pub internal_host: Option<String>,

    /// When set, takes precedence over `port` for where the server binds.
    #[arg(long, env = "CONTROL_PLANE_INTERNAL_PORT")]
    pub internal_port: Option<u16>,

    #[arg(long, env = "CONTROL_PLANE_TOPIC_NAMESPACE", default_value = "llama_deploy")]
    pub topic_namespace: String,

    #[arg(long, env = "CONTROL_PLANE_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    #[arg(long, env = "CONTROL_PLANE_STATE_STORE_URI")]
    pub state_store_uri: Option<String>,

    #[arg(long, env = "CONTROL_PLANE_SERVICES_STORE_KEY", default_value = "services")]
    pub services_store_key: String,

    #[arg(long, env = "CONTROL_PLANE_TASKS_STORE_KEY", default_value = "tasks")]
    pub tasks_store_key: String,

    #[arg(long, env = "CONTROL_PLANE_SESSION_STORE_KEY", default_value = "sessions")]
    pub session_store_key: String,

    /// Seconds between polls of the NDJSON stream endpoint.
    #[arg(long, env = "CONTROL_PLANE_STEP_INTERVAL", default_value_t = 0.1)]
    pub step_interval: f64,

    #[arg(skip = true)]
    pub running: bool,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            internal_host: None,
            internal_port: None,
            topic_namespace: "llama_deploy".to_string(),
            cors_origins: Vec::new(),
            state_store_uri: None,
            services_store_key: "services".to_string(),
            tasks_store_key: "tasks".to_string(),
            session_store_key: "sessions".to_string(),
            step_interval: 0.1,
            running: true,
        }
    }
}

impl ControlPlaneConfig {
    /// The effective bind address: the internal pair wins when set.
    pub fn bind_host(&self) -> &str {
        self.internal_host.as_deref().unwrap_or(&self.host)
    }

    pub fn bind_port(&self) -> u16 {
        self.internal_port.unwrap_or(self.port)
    }

    pub fn topic(&self, message_type: &str) -> String {
        queue_message::topic(&self.topic_namespace, message_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_pair_wins_when_set() {
        let mut config = ControlPlaneConfig::default();
        config.host = "0.0.0.0".to_string();
        config.port = 80;
        config.internal_host = Some("10.0.0.1".to_string());
        config.internal_port = Some(9000);
        assert_eq!(config.bind_host(), "10.0.0.1");
        assert_eq!(config.bind_port(), 9000);
    }

    #[test]
    fn falls_back_to_external_pair() {
        let config = ControlPlaneConfig::default();
        assert_eq!(config.bind_host(), "127.0.0.1");
        assert_eq!(config.bind_port(), 8000);
    }
}
