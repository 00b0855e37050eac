//! Wire types for the remote analyze endpoint.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::TaskKind;

/// Inline attachment carrying page-image context for the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub data_base64: String,
}

impl Attachment {
    pub fn png(filename: &str, bytes: &[u8]) -> Self {
        Self {
            filename: filename.to_string(),
            content_type: "image/png".to_string(),
            data_base64: BASE64.encode(bytes),
        }
    }
}

/// One task with its rendered instruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPrompt {
    pub task: TaskKind,
    pub prompt: String,
}

/// One analysis request: a page batch tagged with the job's task list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub document_id: String,
    pub page_indices: Vec<usize>,
    pub tasks: Vec<TaskPrompt>,
    pub model_version: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub context: HashMap<String, String>,
}

/// Per-task answer inside the worker's response array.
///
/// Parsing is strict: an element that does not deserialize into this shape
/// is a contract violation, reported separately from transport failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub request_id: String,
    pub model_version: String,
    pub task: TaskKind,
    pub raw_text: String,
    #[serde(default)]
    pub parsed_json: Option<serde_json::Value>,
    #[serde(default)]
    pub tokens_input: Option<u64>,
    #[serde(default)]
    pub tokens_output: Option<u64>,
    #[serde(default)]
    pub latency_ms: Option<u64>,
}

/// Parsed response for one request, stamped on receipt.
#[derive(Debug, Clone)]
pub struct AnalyzeResponse {
    pub results: Vec<TaskResult>,
    pub received_at: DateTime<Utc>,
}

impl AnalyzeResponse {
    pub fn new(results: Vec<TaskResult>) -> Self {
        Self {
            results,
            received_at: Utc::now(),
        }
    }
}
