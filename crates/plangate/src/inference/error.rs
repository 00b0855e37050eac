use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    /// Endpoint unreachable or the call timed out.
    #[error("Transport error reaching inference endpoint: {0}")]
    Transport(String),

    /// Endpoint answered with a non-success HTTP status.
    #[error("Inference endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Endpoint answered, but the payload did not match the contract.
    /// Retrying cannot fix a shape mismatch.
    #[error("Inference response did not match the expected contract: {0}")]
    Parse(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl InferenceError {
    /// Transient failures worth retrying: transport errors and server-side
    /// HTTP statuses. Parse and client-side statuses are permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            InferenceError::Transport(_) => true,
            InferenceError::Status { status, .. } => *status >= 500,
            InferenceError::Parse(_) | InferenceError::Client(_) => false,
        }
    }
}
