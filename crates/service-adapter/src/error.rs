/// Errors surfaced by [`crate::ServiceClient`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("control plane request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("control plane returned {status}: {body}")]
    Response { status: reqwest::StatusCode, body: String },

    #[error("failed to decode control plane response: {0}")]
    Decode(#[from] serde_json::Error),
}
