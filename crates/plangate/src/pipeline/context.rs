use std::path::PathBuf;

use crate::inference::AnalyzeRequest;
use crate::job::{Job, PageFinding};

/// One rasterized page, kept in memory for prompt building.
pub struct RenderedPage {
    pub index: usize,
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

pub struct PipelineContext {
    /// Snapshot of the job taken when the worker picked it up.
    pub job: Job,

    // Rasterize output
    pub pages: Vec<RenderedPage>,

    // Request-building output
    pub requests: Vec<AnalyzeRequest>,

    // Analysis output
    pub findings: Vec<PageFinding>,
    pub model_version: Option<String>,
}

impl PipelineContext {
    pub fn new(job: Job) -> Self {
        Self {
            job,
            pages: Vec::new(),
            requests: Vec::new(),
            findings: Vec::new(),
            model_version: None,
        }
    }
}
