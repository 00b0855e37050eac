//! Service facade over the store, artifact manager, and dispatcher.
//!
//! This is what the transport layer (HTTP routes, CLI, embedding host)
//! talks to: submission, status queries, QA requeue, cache purge, health.

use std::sync::Arc;

use log::info;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::artifacts::{ArtifactStore, PurgeReport};
use crate::config::GatewayConfig;
use crate::error::{Result, ValidationError};
use crate::inference::{Analyzer, InferenceClient};
use crate::job::{Job, TaskKind};
use crate::dispatch::Dispatcher;
use crate::pipeline::{JobEvent, Pipeline};
use crate::raster::{PageRenderer, PopplerRasterizer};
use crate::store::JobStore;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Liveness of the gateway: the dispatcher and pool, not just the process.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayHealth {
    pub status: String,
    pub model_version: String,
    pub queue_open: bool,
    pub worker_count: usize,
    pub workers_alive: usize,
}

pub struct Gateway {
    config: GatewayConfig,
    store: Arc<JobStore>,
    artifacts: ArtifactStore,
    dispatcher: Dispatcher,
    events: Arc<broadcast::Sender<JobEvent>>,
}

impl Gateway {
    /// Production constructor: poppler rasterizer plus the HTTP inference
    /// client built from config.
    pub fn start(config: GatewayConfig) -> Result<Self> {
        config.validate()?;
        let renderer: Arc<dyn PageRenderer> =
            Arc::new(PopplerRasterizer::new(config.page_image_dpi));
        let analyzer: Arc<dyn Analyzer> = Arc::new(InferenceClient::from_config(&config)?);
        Self::with_components(config, renderer, analyzer)
    }

    /// Constructor with injected rendering and analysis backends.
    pub fn with_components(
        config: GatewayConfig,
        renderer: Arc<dyn PageRenderer>,
        analyzer: Arc<dyn Analyzer>,
    ) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(JobStore::new());
        let artifacts = ArtifactStore::new(&config.storage_root);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let events = Arc::new(events_tx);

        let pipeline = Arc::new(Pipeline::new(
            &config,
            artifacts.clone(),
            renderer,
            analyzer,
        ));
        let dispatcher = Dispatcher::start(
            &config,
            Arc::clone(&store),
            pipeline,
            Some(Arc::clone(&events)),
        );

        info!(
            "Gateway started: {} workers, queue capacity {}",
            config.worker_count, config.queue_capacity
        );

        Ok(Self {
            config,
            store,
            artifacts,
            dispatcher,
            events,
        })
    }

    /// Accepts a document, creates the job record, persists the upload, and
    /// enqueues processing. Returns the queued job snapshot.
    pub fn submit(
        &self,
        filename: &str,
        contents: &[u8],
        tasks: Option<Vec<TaskKind>>,
    ) -> Result<Job> {
        validate_upload(filename)?;
        let tasks = resolve_tasks(tasks)?;

        let job = self.store.create(filename, tasks);

        let upload_path = match self.artifacts.persist_upload(&job.id, filename, contents) {
            Ok(path) => path,
            Err(e) => {
                let _ = self
                    .store
                    .fail(&job.id, &format!("upload could not be persisted: {e}"));
                return Err(e.into());
            }
        };

        // Snapshot taken before dispatch: the caller always sees the job as
        // it was accepted, even if a worker picks it up immediately.
        let job = self.store.update(&job.id, |j| {
            j.upload_path = Some(upload_path.clone());
            j.metadata
                .insert("storage".to_string(), "local".to_string());
            j.metadata.insert(
                "dpi".to_string(),
                self.config.page_image_dpi.to_string(),
            );
        })?;

        if let Err(e) = self.dispatcher.enqueue(&job.id) {
            let _ = self
                .store
                .fail(&job.id, &format!("system shutting down: {e}"));
            return Err(e.into());
        }

        info!("Job {} queued with tasks {:?}", job.id, job.tasks);
        Ok(job)
    }

    /// All known jobs in creation order.
    pub fn list(&self) -> Vec<Job> {
        self.store.list()
    }

    /// Full record for one job.
    pub fn get(&self, job_id: &str) -> Result<Job> {
        Ok(self.store.get(job_id)?)
    }

    /// Appends a follow-up task to a terminal job and re-enqueues it. The
    /// append is idempotent on the task name; the prior result/error stay
    /// visible until the rerun overwrites them.
    pub fn add_task(&self, job_id: &str, task: TaskKind) -> Result<Job> {
        let job = self.store.get(job_id)?;
        if !job.status.is_terminal() {
            return Err(ValidationError::JobInFlight {
                id: job.id,
                status: job.status,
            }
            .into());
        }
        if job.upload_path.is_none() {
            return Err(ValidationError::MissingUpload { id: job.id }.into());
        }

        let job = self.store.requeue(job_id, task)?;
        if let Err(e) = self.dispatcher.enqueue(job_id) {
            let _ = self
                .store
                .fail(job_id, &format!("system shutting down: {e}"));
            return Err(e.into());
        }

        info!("Job {} requeued with task {}", job.id, task);
        Ok(job)
    }

    /// Deletes the job's generated artifacts (and the original upload when
    /// asked) and drops the removed paths from the record. Idempotent.
    pub fn purge_cache(&self, job_id: &str, remove_original: bool) -> Result<PurgeReport> {
        let job = self.store.get(job_id)?;
        let report = self.artifacts.purge(&job.id, remove_original);

        self.store.update(job_id, |j| {
            j.page_images.retain(|p| !report.removed.contains(p));
            if remove_original {
                if let Some(upload) = &j.upload_path {
                    if report.removed.contains(upload) || !upload.exists() {
                        j.upload_path = None;
                    }
                }
            }
        })?;

        info!(
            "Purged {} artifacts for job {} ({} failures)",
            report.removed_count(),
            job_id,
            report.failures.len()
        );
        Ok(report)
    }

    pub fn health(&self) -> GatewayHealth {
        let dispatcher = self.dispatcher.health();
        let status = if dispatcher.queue_open && dispatcher.workers_alive > 0 {
            "ok"
        } else {
            "degraded"
        };
        GatewayHealth {
            status: status.to_string(),
            model_version: self.config.model_version.clone(),
            queue_open: dispatcher.queue_open,
            worker_count: dispatcher.worker_count,
            workers_alive: dispatcher.workers_alive,
        }
    }

    /// Subscribes to live job progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Stops accepting new work; queued jobs still drain.
    pub fn close(&self) {
        self.dispatcher.close();
    }

    /// Drain-and-stop: close the queue, finish queued jobs, join workers.
    pub fn shutdown(self) {
        info!("Gateway shutting down");
        self.dispatcher.join();
    }
}

fn validate_upload(filename: &str) -> std::result::Result<(), ValidationError> {
    let is_pdf = mime_guess::from_path(filename)
        .first()
        .map(|mime| mime.essence_str() == "application/pdf")
        .unwrap_or(false);
    if is_pdf {
        Ok(())
    } else {
        Err(ValidationError::UnsupportedFileType {
            filename: filename.to_string(),
        })
    }
}

fn resolve_tasks(
    tasks: Option<Vec<TaskKind>>,
) -> std::result::Result<Vec<TaskKind>, ValidationError> {
    match tasks {
        None => Ok(TaskKind::DEFAULT.to_vec()),
        Some(tasks) if tasks.is_empty() => Err(ValidationError::EmptyTaskList),
        Some(tasks) => {
            let mut unique = Vec::with_capacity(tasks.len());
            for task in tasks {
                if !unique.contains(&task) {
                    unique.push(task);
                }
            }
            Ok(unique)
        }
    }
}
