use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Analysis task requested for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Layout,
    Rooms,
    Annotations,
    Qa,
    Compare,
}

impl TaskKind {
    /// Tasks applied to a submission that does not name any explicitly.
    pub const DEFAULT: [TaskKind; 3] = [TaskKind::Layout, TaskKind::Rooms, TaskKind::Annotations];
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Layout => write!(f, "layout"),
            TaskKind::Rooms => write!(f, "rooms"),
            TaskKind::Annotations => write!(f, "annotations"),
            TaskKind::Qa => write!(f, "qa"),
            TaskKind::Compare => write!(f, "compare"),
        }
    }
}

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Done,
    Failed,
}

impl JobStatus {
    /// Returns true for states a job can only leave via an explicit requeue.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    /// Transition table. Terminal states re-enter `Queued` only through the
    /// requeue path; `Queued -> Failed` covers submissions refused before
    /// dispatch (queue closed, upload could not be persisted).
    pub fn allows(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Queued, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Done)
                | (JobStatus::Processing, JobStatus::Failed)
                | (JobStatus::Done, JobStatus::Queued)
                | (JobStatus::Failed, JobStatus::Queued)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Done => write!(f, "done"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One remote analysis answer, keyed by page and task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageFinding {
    pub request_id: String,
    pub task: TaskKind,
    pub page_index: usize,
    pub raw_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_input: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_output: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

/// Aggregated result of one pipeline run, stored on the job when it is done.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub model_version: String,
    pub page_count: usize,
    pub findings: Vec<PageFinding>,
}

/// A tracked document-processing request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Unique job identifier, assigned once at creation.
    pub id: String,
    /// Original uploaded file name.
    pub filename: String,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Requested analysis tasks. Append-only; requeue adds, nothing removes.
    pub tasks: Vec<TaskKind>,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// Bumped on every status or task-list mutation.
    pub updated_at: DateTime<Utc>,
    /// Page count, known once the document has been rasterized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_pages: Option<usize>,
    /// Location of the original upload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_path: Option<PathBuf>,
    /// Locations of generated per-page images.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub page_images: Vec<PathBuf>,
    /// Result of the latest successful run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisReport>,
    /// Description of the latest failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Free-form submission metadata (storage backend, raster DPI).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl Job {
    /// Creates a new queued job with a fresh identifier.
    pub fn new(filename: &str, tasks: Vec<TaskKind>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            filename: filename.to_string(),
            status: JobStatus::Queued,
            tasks,
            created_at: now,
            updated_at: now,
            num_pages: None,
            upload_path: None,
            page_images: Vec::new(),
            result: None,
            error: None,
            metadata: HashMap::new(),
        }
    }

    pub fn has_task(&self, task: TaskKind) -> bool {
        self.tasks.contains(&task)
    }

    /// Appends a task unless it is already present. Returns true if added.
    pub fn push_task(&mut self, task: TaskKind) -> bool {
        if self.has_task(task) {
            false
        } else {
            self.tasks.push(task);
            true
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_queued() {
        let job = Job::new("plan.pdf", TaskKind::DEFAULT.to_vec());
        assert!(!job.id.is_empty());
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.tasks, TaskKind::DEFAULT.to_vec());
        assert!(job.result.is_none());
        assert!(job.error.is_none());
        assert!(job.page_images.is_empty());
    }

    #[test]
    fn test_job_ids_are_unique() {
        let a = Job::new("a.pdf", vec![TaskKind::Layout]);
        let b = Job::new("a.pdf", vec![TaskKind::Layout]);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_push_task_is_idempotent() {
        let mut job = Job::new("plan.pdf", vec![TaskKind::Layout, TaskKind::Rooms]);
        assert!(job.push_task(TaskKind::Qa));
        assert!(!job.push_task(TaskKind::Qa));
        assert_eq!(
            job.tasks,
            vec![TaskKind::Layout, TaskKind::Rooms, TaskKind::Qa]
        );
    }

    #[test]
    fn test_transition_table() {
        use JobStatus::*;

        let legal = [
            (Queued, Processing),
            (Queued, Failed),
            (Processing, Done),
            (Processing, Failed),
            (Done, Queued),
            (Failed, Queued),
        ];
        for (from, to) in legal {
            assert!(from.allows(to), "{from} -> {to} should be allowed");
        }

        let illegal = [
            (Queued, Done),
            (Processing, Queued),
            (Done, Processing),
            (Done, Failed),
            (Failed, Done),
            (Failed, Processing),
            (Queued, Queued),
            (Done, Done),
        ];
        for (from, to) in illegal {
            assert!(!from.allows(to), "{from} -> {to} should be rejected");
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }

    #[test]
    fn test_task_kind_wire_names() {
        let json = serde_json::to_string(&TaskKind::Annotations).unwrap();
        assert_eq!(json, "\"annotations\"");
        let parsed: TaskKind = serde_json::from_str("\"qa\"").unwrap();
        assert_eq!(parsed, TaskKind::Qa);
    }

    #[test]
    fn test_job_serialization_skips_empty_fields() {
        let job = Job::new("plan.pdf", vec![TaskKind::Layout]);
        let json = serde_json::to_value(&job).unwrap();
        assert!(json.get("result").is_none());
        assert!(json.get("error").is_none());
        assert!(json.get("numPages").is_none());
        assert_eq!(json["status"], "queued");
    }
}
