//! Prompt templates and request assembly for the analysis tasks.

use std::collections::HashMap;

use log::debug;

use crate::inference::{AnalyzeRequest, Attachment, TaskPrompt};
use crate::job::{Job, TaskKind};

use super::context::RenderedPage;

/// Fixed instruction sent to the model for each task kind.
pub fn prompt_for(task: TaskKind) -> &'static str {
    match task {
        TaskKind::Layout => {
            "Analyze the architectural floor plan image and describe the primary layout \
             elements including walls, structural grids, circulation paths, and key symbols. \
             Return JSON with 'layout', 'symbols', and 'notes' arrays."
        }
        TaskKind::Rooms => {
            "Extract every room with name, usage, area, and bounding polygon. \
             Respond in JSON: {\"rooms\": [{\"name\": str, \"area\": float, \
             \"level\": str | null, \"polygon\": [[x, y], ...]]}]. Coordinates normalised 0-1."
        }
        TaskKind::Annotations => {
            "List dimensions, annotations, and legend items along with their coordinates. \
             Return JSON with 'dimensions' and 'annotations' arrays."
        }
        TaskKind::Qa => {
            "Evaluate the plan for basic code compliance and QA rules provided in the context. \
             Output JSON {\"qa_results\": [{\"rule\": str, \"severity\": str, \"message\": str}]}."
        }
        TaskKind::Compare => {
            "Compare the supplied plan with context drawings and summarise differences. \
             Output JSON {\"diffs\": [{\"description\": str, \"severity\": str}]}."
        }
    }
}

/// Builds one request per page, tagged with the job's full task list and
/// carrying the page image inline.
pub fn build_requests(job: &Job, pages: &[RenderedPage], model_version: &str) -> Vec<AnalyzeRequest> {
    let mut requests = Vec::with_capacity(pages.len());

    for page in pages {
        let filename = page
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("page-{:04}.png", page.index));

        let tasks: Vec<TaskPrompt> = job
            .tasks
            .iter()
            .map(|&task| TaskPrompt {
                task,
                prompt: prompt_for(task).to_string(),
            })
            .collect();

        let mut context = HashMap::new();
        context.insert("filename".to_string(), job.filename.clone());

        requests.push(AnalyzeRequest {
            document_id: job.id.clone(),
            page_indices: vec![page.index],
            tasks,
            model_version: model_version.to_string(),
            attachments: vec![Attachment::png(&filename, &page.bytes)],
            context,
        });
        debug!(
            "Prepared analysis request for job {} page {} covering {} tasks",
            job.id,
            page.index,
            job.tasks.len()
        );
    }

    requests
}
