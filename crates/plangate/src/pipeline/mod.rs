pub mod context;
pub mod error;
pub mod progress;
pub mod prompts;
pub mod runner;

pub use context::{PipelineContext, RenderedPage};
pub use error::PipelineError;
pub use progress::{JobEvent, JobStage, NoopProgress, ProgressEvent, ProgressReporter, StoreProgress};
pub use runner::{Pipeline, PipelineOutcome};
