use dashmap::DashMap;
use serde_json::Value;

use crate::{Error, StateStore};

/// An in-memory state store. Each collection is its own `DashMap`, so a
/// read or write against one key never blocks a concurrent operation on a
/// different key — callers needing read-modify-write semantics across a
/// single key must still serialize themselves (see the control plane's
/// per-session lock).
#[derive(Default)]
pub struct InMemoryStateStore {
    collections: DashMap<String, DashMap<String, Value>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn collection(&self, name: &str) -> dashmap::mapref::one::Ref<'_, String, DashMap<String, Value>> {
        self.collections
            .entry(name.to_string())
            .or_default();
        self.collections.get(name).expect("just inserted")
    }
}

#[async_trait::async_trait]
impl StateStore for InMemoryStateStore {
    async fn aput(&self, key: &str, value: Value, collection: &str) -> Result<(), Error> {
        self.collection(collection).insert(key.to_string(), value);
        Ok(())
    }

    async fn aget(&self, key: &str, collection: &str) -> Result<Option<Value>, Error> {
        Ok(self.collection(collection).get(key).map(|v| v.clone()))
    }

    async fn aget_all(&self, collection: &str) -> Result<Vec<(String, Value)>, Error> {
        Ok(self
            .collection(collection)
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect())
    }

    async fn adelete(&self, key: &str, collection: &str) -> Result<(), Error> {
        self.collection(collection).remove(key);
        Ok(())
    }
}
