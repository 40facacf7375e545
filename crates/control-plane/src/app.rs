use std::sync::Arc;

use dashmap::DashMap;
use message_queue::MessageQueue;
use state_store::{parse_state_store_uri, InMemoryStateStore, StateStore};
use tokio::sync::Mutex;

use crate::config::ControlPlaneConfig;
use crate::error::ControlPlaneError;

/// The control plane's shared, `Arc`-wrapped state. Owns the service
/// registry (via the state store), session/task state, the message queue
/// client, and the per-session write locks that serialize
/// read-modify-write updates against a single session (spec §5, §9).
pub struct ControlPlane {
    pub(crate) config: ControlPlaneConfig,
    pub(crate) state_store: Arc<dyn StateStore>,
    pub(crate) message_queue: Arc<dyn MessageQueue>,
    pub(crate) publisher_id: String,
    session_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ControlPlane {
    pub fn new(
        config: ControlPlaneConfig,
        message_queue: Arc<dyn MessageQueue>,
        state_store: Option<Arc<dyn StateStore>>,
    ) -> Result<Arc<Self>, ControlPlaneError> {
        if state_store.is_some() && config.state_store_uri.is_some() {
            return Err(ControlPlaneError::Conflict(
                "please use either an explicit state store or 'state_store_uri', not both".into(),
            ));
        }

        let state_store: Arc<dyn StateStore> = match (state_store, &config.state_store_uri) {
            (Some(store), None) => store,
            (None, Some(uri)) => {
                parse_state_store_uri(uri).map_err(|err| ControlPlaneError::Internal(err.into()))?
            }
            (None, None) => Arc::new(InMemoryStateStore::new()),
            (Some(_), Some(_)) => unreachable!("checked above"),
        };

        Ok(Arc::new(Self {
            config,
            state_store,
            message_queue,
            publisher_id: format!("ControlPlane-{}", uuid::Uuid::new_v4()),
            session_locks: DashMap::new(),
        }))
    }

    /// The topic for a given message type in this control plane's namespace.
    pub fn topic(&self, message_type: &str) -> String {
        self.config.topic(message_type)
    }

    /// This control plane's configuration, e.g. so a binary can read the
    /// bind address it was constructed with.
    pub fn config(&self) -> &ControlPlaneConfig {
        &self.config
    }

    /// A handle to the underlying bus client, so a caller (a workflow
    /// service stand-in, a test harness) can subscribe to its own topic
    /// directly rather than going through HTTP.
    pub fn message_queue(&self) -> Arc<dyn message_queue::MessageQueue> {
        self.message_queue.clone()
    }

    /// Acquires the single-writer lock for `session_id`, creating it on
    /// first use. The lock map itself only ever grows: sessions are rare
    /// enough, and short-lived enough within a process, that this is not a
    /// practical leak (spec §5, §9 "State concurrency").
    pub(crate) async fn lock_session(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.session_locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
