use std::sync::Arc;

use tracing::info_span;

use crate::artifacts::ArtifactStore;
use crate::config::GatewayConfig;
use crate::inference::Analyzer;
use crate::job::{AnalysisReport, PageFinding};
use crate::raster::PageRenderer;

use super::context::{PipelineContext, RenderedPage};
use super::error::PipelineError;
use super::progress::{JobStage, ProgressEvent, ProgressReporter};
use super::prompts;

/// Terminal result of one pipeline run, for worker-side logging. The store
/// holds the authoritative state.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub job_id: String,
    pub success: bool,
    pub error: Option<String>,
}

impl PipelineOutcome {
    fn success(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            success: true,
            error: None,
        }
    }

    fn failure(job_id: &str, error: String) -> Self {
        Self {
            job_id: job_id.to_string(),
            success: false,
            error: Some(error),
        }
    }
}

/// Per-job processing sequence: rasterize, build requests, analyze,
/// aggregate. The first stage failure ends the run; retry policy lives
/// inside the analyzer, not here.
pub struct Pipeline {
    renderer: Arc<dyn PageRenderer>,
    analyzer: Arc<dyn Analyzer>,
    artifacts: ArtifactStore,
    model_version: String,
}

impl Pipeline {
    pub fn new(
        config: &GatewayConfig,
        artifacts: ArtifactStore,
        renderer: Arc<dyn PageRenderer>,
        analyzer: Arc<dyn Analyzer>,
    ) -> Self {
        Self {
            renderer,
            analyzer,
            artifacts,
            model_version: config.model_version.clone(),
        }
    }

    /// Runs the full pipeline for one job.
    pub fn run(
        &self,
        mut ctx: PipelineContext,
        progress: &dyn ProgressReporter,
    ) -> (PipelineOutcome, PipelineContext) {
        let _pipeline_span = info_span!("pipeline",
            job_id = %ctx.job.id,
            filename = %ctx.job.filename,
        )
        .entered();

        // Stage 1: rasterize
        {
            let _step = info_span!("rasterize").entered();
            progress.report(ProgressEvent::Stage {
                stage: JobStage::Rasterizing,
                message: "Rendering document pages...".to_string(),
            });
            if let Err(e) = self.step_rasterize(&mut ctx) {
                return self.fail(ctx, progress, e);
            }
            progress.report(ProgressEvent::PagesRasterized {
                paths: ctx.pages.iter().map(|p| p.path.clone()).collect(),
            });
        }

        // Stage 2: build requests
        {
            let _step = info_span!("build_requests").entered();
            progress.report(ProgressEvent::Stage {
                stage: JobStage::BuildingRequests,
                message: "Assembling analysis prompts...".to_string(),
            });
            ctx.requests = prompts::build_requests(&ctx.job, &ctx.pages, &self.model_version);
            if ctx.requests.is_empty() {
                log::warn!("No analysis requests created for job {}", ctx.job.id);
            }
        }

        // Stage 3: remote analysis
        {
            let _step = info_span!("analyze").entered();
            progress.report(ProgressEvent::Stage {
                stage: JobStage::Analyzing,
                message: format!("Submitting {} requests for analysis...", ctx.requests.len()),
            });
            if let Err(e) = self.step_analyze(&mut ctx) {
                return self.fail(ctx, progress, e);
            }
        }

        // Stage 4: aggregate
        let report = {
            let _step = info_span!("aggregate").entered();
            progress.report(ProgressEvent::Stage {
                stage: JobStage::Aggregating,
                message: "Merging per-page results...".to_string(),
            });
            self.step_aggregate(&ctx)
        };

        progress.report(ProgressEvent::Completed { report });
        (PipelineOutcome::success(&ctx.job.id), ctx)
    }

    fn fail(
        &self,
        ctx: PipelineContext,
        progress: &dyn ProgressReporter,
        error: PipelineError,
    ) -> (PipelineOutcome, PipelineContext) {
        let message = error.to_string();
        progress.report(ProgressEvent::Failed {
            error: message.clone(),
        });
        (PipelineOutcome::failure(&ctx.job.id, message), ctx)
    }

    fn step_rasterize(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let pdf = ctx
            .job
            .upload_path
            .clone()
            .ok_or_else(|| PipelineError::MissingUpload(ctx.job.id.clone()))?;

        let page_count = self.renderer.page_count(&pdf)?;
        for index in 0..page_count {
            let bytes = self.renderer.render_page(&pdf, index)?;
            let path = self.artifacts.write_page_image(&ctx.job.id, index, &bytes)?;
            ctx.pages.push(RenderedPage { index, path, bytes });
        }
        Ok(())
    }

    fn step_analyze(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        for request in &ctx.requests {
            let response = self.analyzer.analyze(request)?;
            let page_index = request.page_indices.first().copied().unwrap_or(0);
            for result in response.results {
                if ctx.model_version.is_none() {
                    ctx.model_version = Some(result.model_version.clone());
                }
                ctx.findings.push(PageFinding {
                    request_id: result.request_id,
                    task: result.task,
                    page_index,
                    raw_text: result.raw_text,
                    parsed: result.parsed_json,
                    tokens_input: result.tokens_input,
                    tokens_output: result.tokens_output,
                    latency_ms: result.latency_ms,
                });
            }
        }
        Ok(())
    }

    fn step_aggregate(&self, ctx: &PipelineContext) -> AnalysisReport {
        AnalysisReport {
            model_version: ctx
                .model_version
                .clone()
                .unwrap_or_else(|| self.model_version.clone()),
            page_count: ctx.pages.len(),
            findings: ctx.findings.clone(),
        }
    }
}
