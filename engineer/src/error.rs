//! Typed failure kinds raised by the pipeline.
//!
//! Functions return `anyhow::Result`; these values travel inside
//! `anyhow::Error` and callers recover them with `downcast_ref`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required key is absent from a store (or a replayed transcript is unusable).
    #[error("'{key}' could not be found in the {store} store")]
    NotFound { store: String, key: String },

    /// The requested preset name has no step list.
    #[error("invalid steps configuration '{0}'")]
    InvalidConfiguration(String),

    /// A store key that would resolve outside the store root.
    #[error("invalid store key '{0}'")]
    InvalidKey(String),

    /// The backend call failed at the transport level (connection, non-2xx).
    #[error("backend transport error: {0}")]
    Transport(String),

    /// The backend replied with a body that is not a chat completion.
    #[error("malformed backend response: {0}")]
    MalformedResponse(String),
}

impl PipelineError {
    pub fn not_found(store: &str, key: &str) -> Self {
        Self::NotFound {
            store: store.to_string(),
            key: key.to_string(),
        }
    }
}

/// Returns the typed kind carried by `err`, if any.
pub fn kind(err: &anyhow::Error) -> Option<&PipelineError> {
    err.downcast_ref::<PipelineError>()
}
