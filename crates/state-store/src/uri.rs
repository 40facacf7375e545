use std::sync::Arc;

use crate::{InMemoryStateStore, StateStore};

#[derive(Debug, thiserror::Error)]
pub enum StateStoreUriError {
    #[error("unsupported state store scheme '{0}': only 'memory://' is implemented by this core")]
    UnsupportedScheme(String),
    #[error("malformed state store uri '{0}'")]
    Malformed(String),
}

/// Resolves a `state_store_uri` into a concrete [`StateStore`]. Only the
/// `memory://` scheme is implemented here; any other scheme (e.g. a
/// Redis- or Mongo-backed store) is a [`StateStoreUriError`], since those
/// back-ends are external collaborators outside this core (spec §4.3,
/// SPEC_FULL §4.3).
pub fn parse_state_store_uri(uri: &str) -> Result<Arc<dyn StateStore>, StateStoreUriError> {
    let scheme = uri
        .split_once("://")
        .map(|(scheme, _)| scheme)
        .ok_or_else(|| StateStoreUriError::Malformed(uri.to_string()))?;

    match scheme {
        "memory" => Ok(Arc::new(InMemoryStateStore::new())),
        other => Err(StateStoreUriError::UnsupportedScheme(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_scheme_resolves() {
        assert!(parse_state_store_uri("memory://").is_ok());
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        let err = parse_state_store_uri("redis://localhost:6379").unwrap_err();
        assert!(matches!(err, StateStoreUriError::UnsupportedScheme(_)));
    }

    #[test]
    fn malformed_uri_is_rejected() {
        let err = parse_state_store_uri("not-a-uri").unwrap_err();
        assert!(matches!(err, StateStoreUriError::Malformed(_)));
    }
}
