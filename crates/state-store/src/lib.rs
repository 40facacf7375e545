//! A collection-keyed key-value store. A trivial in-memory map satisfies the
//! contract; a URI-parsed back-end may substitute a real KV database (spec
//! §4.3). Only individual-key atomicity is required — no cross-collection
//! transactions.

mod memory;
mod uri;

pub use memory::InMemoryStateStore;
pub use uri::{parse_state_store_uri, StateStoreUriError};

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("state store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// The control plane's three collections.
pub const SERVICES_COLLECTION: &str = "services";
pub const SESSIONS_COLLECTION: &str = "sessions";
pub const TASKS_COLLECTION: &str = "tasks";

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Upsert `value` at `key` within `collection`.
    async fn aput(&self, key: &str, value: Value, collection: &str) -> Result<(), Error>;

    /// Fetch the value at `key` within `collection`, or `None` if absent.
    async fn aget(&self, key: &str, collection: &str) -> Result<Option<Value>, Error>;

    /// Fetch every key/value pair currently in `collection`.
    async fn aget_all(&self, collection: &str) -> Result<Vec<(String, Value)>, Error>;

    /// Remove `key` from `collection`. Idempotent: deleting an absent key
    /// is not an error.
    async fn adelete(&self, key: &str, collection: &str) -> Result<(), Error>;
}
