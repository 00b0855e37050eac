pub mod artifacts;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod inference;
pub mod job;
pub mod logging;
pub mod pipeline;
pub mod raster;
pub mod store;

pub use artifacts::{ArtifactStore, PurgeFailure, PurgeReport};
pub use config::{load_config, EnqueueMode, GatewayConfig};
pub use dispatch::{Dispatcher, DispatcherHealth};
pub use error::{
    ArtifactError, ConfigError, DispatchError, PlangateError, RasterError, Result, StoreError,
    ValidationError,
};
pub use gateway::{Gateway, GatewayHealth};
pub use inference::{
    Analyzer, AnalyzeRequest, AnalyzeResponse, InferenceClient, InferenceError, TaskPrompt,
    TaskResult,
};
pub use job::{AnalysisReport, Job, JobStatus, PageFinding, TaskKind};
pub use pipeline::{JobEvent, JobStage, Pipeline, PipelineContext};
pub use raster::{PageRenderer, PopplerRasterizer};
pub use store::JobStore;
