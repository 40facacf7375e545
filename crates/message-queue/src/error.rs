/// Errors surfaced by a [`crate::MessageQueue`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An unrecoverable broker issue (connection refused, auth failure, ...).
    /// Publishers propagate this to the caller; consumers reconnect with
    /// back-off instead of raising it per-message.
    #[error("broker transport error: {0}")]
    Transport(#[from] anyhow::Error),

    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    #[error("consumer not registered")]
    ConsumerNotRegistered,
}
