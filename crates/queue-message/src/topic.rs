use std::sync::LazyLock;

use regex::Regex;

static TOPIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+\.[A-Za-z0-9_\-]+$").unwrap());

/// The fully qualified topic name for a given namespace and message type:
/// `"<topic_namespace>.<message_type>"`.
pub fn topic(namespace: &str, message_type: &str) -> String {
    format!("{namespace}.{message_type}")
}

/// True if `candidate` matches `^<topic_namespace>\.[A-Za-z0-9_\-]+$`.
pub fn is_valid_topic(candidate: &str) -> bool {
    TOPIC_RE.is_match(candidate)
}
