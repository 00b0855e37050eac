pub mod client;
pub mod error;
pub mod protocol;

pub use client::{InferenceClient, RetryPolicy};
pub use error::InferenceError;
pub use protocol::{AnalyzeRequest, AnalyzeResponse, Attachment, TaskPrompt, TaskResult};

/// Narrow seam in front of the remote inference endpoint.
///
/// The pipeline only ever calls `analyze`; the retry/backoff policy lives
/// entirely behind it.
pub trait Analyzer: Send + Sync {
    fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalyzeResponse, InferenceError>;
}
