//! Shared harness for integration tests: a gateway wired to scripted
//! rendering and analysis backends, plus polling helpers.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

use tempfile::TempDir;

use plangate::{
    AnalyzeRequest, AnalyzeResponse, Analyzer, Gateway, GatewayConfig, InferenceError, Job,
    JobStatus, PageRenderer, RasterError, TaskResult,
};

/// Renderer producing a fixed number of synthetic pages.
pub struct FakeRenderer {
    pub pages: usize,
}

impl PageRenderer for FakeRenderer {
    fn page_count(&self, _pdf: &Path) -> Result<usize, RasterError> {
        Ok(self.pages)
    }

    fn render_page(&self, _pdf: &Path, page_index: usize) -> Result<Vec<u8>, RasterError> {
        Ok(format!("png-{page_index}").into_bytes())
    }
}

pub fn canned_response(request: &AnalyzeRequest) -> AnalyzeResponse {
    let results = request
        .tasks
        .iter()
        .map(|prompt| TaskResult {
            request_id: format!("r-{}-{}", request.page_indices[0], prompt.task),
            model_version: "mock-vl".to_string(),
            task: prompt.task,
            raw_text: format!("{{\"{}\": []}}", prompt.task),
            parsed_json: Some(
                serde_json::json!({ "task": prompt.task.to_string(), "items": [] }),
            ),
            tokens_input: Some(800),
            tokens_output: Some(90),
            latency_ms: Some(42),
        })
        .collect();
    AnalyzeResponse::new(results)
}

enum AnalyzerMode {
    Succeed,
    TransportFail,
    Gated(Mutex<mpsc::Receiver<()>>),
}

/// Scripted analyzer counting every call it receives.
pub struct ScriptedAnalyzer {
    mode: AnalyzerMode,
    calls: AtomicUsize,
}

impl ScriptedAnalyzer {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self {
            mode: AnalyzerMode::Succeed,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn transport_failing() -> Arc<Self> {
        Arc::new(Self {
            mode: AnalyzerMode::TransportFail,
            calls: AtomicUsize::new(0),
        })
    }

    /// Analyzer that blocks every call until the returned sender fires.
    pub fn gated() -> (Arc<Self>, mpsc::Sender<()>) {
        let (release, gate) = mpsc::channel();
        (
            Arc::new(Self {
                mode: AnalyzerMode::Gated(Mutex::new(gate)),
                calls: AtomicUsize::new(0),
            }),
            release,
        )
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Analyzer for ScriptedAnalyzer {
    fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalyzeResponse, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            AnalyzerMode::Succeed => Ok(canned_response(request)),
            AnalyzerMode::TransportFail => Err(InferenceError::Transport(
                "connection reset by peer".to_string(),
            )),
            AnalyzerMode::Gated(gate) => {
                let gate = gate.lock().unwrap();
                let _ = gate.recv_timeout(Duration::from_secs(10));
                Ok(canned_response(request))
            }
        }
    }
}

/// Gateway over temp storage with injected backends.
pub struct TestGateway {
    pub gateway: Gateway,
    _dir: TempDir,
}

impl TestGateway {
    pub fn new(pages: usize, analyzer: Arc<dyn Analyzer>) -> Self {
        let dir = TempDir::new().unwrap();
        let config = GatewayConfig {
            storage_root: dir.path().join("uploads"),
            worker_count: 2,
            queue_capacity: 16,
            ..Default::default()
        };
        let gateway =
            Gateway::with_components(config, Arc::new(FakeRenderer { pages }), analyzer).unwrap();
        Self {
            gateway,
            _dir: dir,
        }
    }

    /// Polls until the job reaches `status` or the timeout trips.
    pub fn wait_for(&self, job_id: &str, status: JobStatus) -> Job {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let job = self.gateway.get(job_id).unwrap();
            if job.status == status {
                return job;
            }
            assert!(
                Instant::now() < deadline,
                "timed out waiting for job {job_id} to reach {status}, currently {}",
                job.status
            );
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}
