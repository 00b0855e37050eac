use thiserror::Error;

use crate::error::{ArtifactError, RasterError};
use crate::inference::InferenceError;

/// Stage-tagged pipeline failures. The tag ends up in the job's error field
/// so a status query tells which stage gave up.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("rasterize failed: {0}")]
    Rasterize(#[from] RasterError),

    #[error("artifact write failed: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("analysis failed: {0}")]
    Analyze(#[from] InferenceError),

    #[error("original upload for job {0} is missing")]
    MissingUpload(String),
}
