//! Stage transition reporting.
//!
//! The pipeline reports what happened; the reporter decides where it lands.
//! In production that is the job store (the source of truth for status
//! queries) plus a best-effort broadcast channel for live status streams.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::job::{AnalysisReport, Job, JobStatus};
use crate::store::JobStore;

/// Pipeline stage names as they appear in progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Rasterizing,
    BuildingRequests,
    Analyzing,
    Aggregating,
    Completed,
    Failed,
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStage::Rasterizing => write!(f, "Rasterizing pages"),
            JobStage::BuildingRequests => write!(f, "Building analysis requests"),
            JobStage::Analyzing => write!(f, "Running remote analysis"),
            JobStage::Aggregating => write!(f, "Aggregating results"),
            JobStage::Completed => write!(f, "Completed"),
            JobStage::Failed => write!(f, "Failed"),
        }
    }
}

/// Broadcast payload for live job status streams.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub job_id: String,
    pub filename: String,
    pub stage: JobStage,
    pub status: JobStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Events emitted by the pipeline during processing.
pub enum ProgressEvent {
    Stage { stage: JobStage, message: String },
    PagesRasterized { paths: Vec<PathBuf> },
    Completed { report: AnalysisReport },
    Failed { error: String },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Production reporter: writes stage transitions through the job store and
/// mirrors them onto the broadcast channel.
pub struct StoreProgress {
    store: Arc<JobStore>,
    job_id: String,
    filename: String,
    events: Option<Arc<broadcast::Sender<JobEvent>>>,
}

impl StoreProgress {
    pub fn new(store: Arc<JobStore>, job: &Job, events: Option<Arc<broadcast::Sender<JobEvent>>>) -> Self {
        Self {
            store,
            job_id: job.id.clone(),
            filename: job.filename.clone(),
            events,
        }
    }

    fn broadcast(&self, stage: JobStage, status: JobStatus, message: String, error: Option<String>) {
        if let Some(sender) = &self.events {
            // Nobody listening is fine.
            let _ = sender.send(JobEvent {
                job_id: self.job_id.clone(),
                filename: self.filename.clone(),
                stage,
                status,
                message,
                timestamp: Utc::now(),
                error,
            });
        }
    }
}

impl ProgressReporter for StoreProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Stage { stage, message } => {
                self.broadcast(stage, JobStatus::Processing, message, None);
            }
            ProgressEvent::PagesRasterized { paths } => {
                let message = format!("Rendered {} pages", paths.len());
                if let Err(e) = self.store.record_pages(&self.job_id, paths) {
                    log::error!("Failed to record pages for job {}: {}", self.job_id, e);
                }
                self.broadcast(JobStage::Rasterizing, JobStatus::Processing, message, None);
            }
            ProgressEvent::Completed { report } => {
                let message = format!(
                    "Analysis completed with {} findings",
                    report.findings.len()
                );
                if let Err(e) = self.store.complete(&self.job_id, report) {
                    log::error!("Failed to complete job {}: {}", self.job_id, e);
                }
                self.broadcast(JobStage::Completed, JobStatus::Done, message, None);
            }
            ProgressEvent::Failed { error } => {
                if let Err(e) = self.store.fail(&self.job_id, &error) {
                    log::error!("Failed to mark job {} failed: {}", self.job_id, e);
                }
                self.broadcast(
                    JobStage::Failed,
                    JobStatus::Failed,
                    "Processing failed".to_string(),
                    Some(error),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::TaskKind;

    fn processing_job(store: &JobStore) -> Job {
        let job = store.create("plan.pdf", vec![TaskKind::Layout]);
        store.mark_processing(&job.id).unwrap()
    }

    fn report() -> AnalysisReport {
        AnalysisReport {
            model_version: "qwen2.5-vl-72b".to_string(),
            page_count: 0,
            findings: vec![],
        }
    }

    #[test]
    fn test_completed_event_writes_through_store() {
        let store = Arc::new(JobStore::new());
        let job = processing_job(&store);
        let progress = StoreProgress::new(Arc::clone(&store), &job, None);

        progress.report(ProgressEvent::Completed { report: report() });

        let job = store.get(&job.id).unwrap();
        assert_eq!(job.status, JobStatus::Done);
        assert!(job.result.is_some());
    }

    #[test]
    fn test_failed_event_writes_through_store() {
        let store = Arc::new(JobStore::new());
        let job = processing_job(&store);
        let progress = StoreProgress::new(Arc::clone(&store), &job, None);

        progress.report(ProgressEvent::Failed {
            error: "rasterize failed: boom".to_string(),
        });

        let job = store.get(&job.id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("rasterize failed: boom"));
    }

    #[test]
    fn test_pages_event_records_paths() {
        let store = Arc::new(JobStore::new());
        let job = processing_job(&store);
        let progress = StoreProgress::new(Arc::clone(&store), &job, None);

        progress.report(ProgressEvent::PagesRasterized {
            paths: vec![PathBuf::from("/tmp/page-0000.png")],
        });

        let job = store.get(&job.id).unwrap();
        assert_eq!(job.num_pages, Some(1));
        assert_eq!(job.page_images.len(), 1);
    }

    #[test]
    fn test_events_are_broadcast() {
        let store = Arc::new(JobStore::new());
        let job = processing_job(&store);
        let (sender, mut receiver) = broadcast::channel(16);
        let progress = StoreProgress::new(Arc::clone(&store), &job, Some(Arc::new(sender)));

        progress.report(ProgressEvent::Stage {
            stage: JobStage::Analyzing,
            message: "Running remote analysis".to_string(),
        });
        progress.report(ProgressEvent::Completed { report: report() });

        let first = receiver.try_recv().unwrap();
        assert_eq!(first.stage, JobStage::Analyzing);
        assert_eq!(first.status, JobStatus::Processing);

        let second = receiver.try_recv().unwrap();
        assert_eq!(second.stage, JobStage::Completed);
        assert_eq!(second.status, JobStatus::Done);
    }
}
