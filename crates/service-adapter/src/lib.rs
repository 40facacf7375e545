//! The workflow-service side of the registration protocol (spec §4.5): a
//! small HTTP client a workflow service links against to announce itself to
//! the control plane, learn the broker configuration, and exchange session
//! state.

mod client;
mod error;

pub use client::ServiceClient;
pub use error::Error;
