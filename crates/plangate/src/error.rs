use std::path::PathBuf;
use thiserror::Error;

use crate::job::JobStatus;

#[derive(Error, Debug)]
pub enum PlangateError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Raster error: {0}")]
    Raster(#[from] RasterError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Inference error: {0}")]
    Inference(#[from] crate::inference::InferenceError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

/// Rejections raised before a job record is created or mutated.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Unsupported file type: '{filename}' (only PDF uploads are accepted)")]
    UnsupportedFileType { filename: String },

    #[error("Task list must not be empty")]
    EmptyTaskList,

    #[error("Job {id} is {status} and cannot be requeued until it finishes")]
    JobInFlight { id: String, status: JobStatus },

    #[error("Original upload for job {id} is no longer available")]
    MissingUpload { id: String },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Job not found: {id}")]
    NotFound { id: String },

    #[error("Job {id} cannot move from {from} to {to}")]
    IllegalTransition {
        id: String,
        from: JobStatus,
        to: JobStatus,
    },
}

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to determine page count: {0}")]
    PageCount(String),

    #[error("Failed to render page: {0}")]
    Render(String),
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Dispatch queue is closed (system shutting down)")]
    QueueClosed,

    #[error("Dispatch queue is full")]
    QueueFull,
}

pub type Result<T> = std::result::Result<T, PlangateError>;
