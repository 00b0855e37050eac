//! Dispatch queue and worker pool.
//!
//! Job references travel through a bounded channel to a fixed pool of worker
//! threads. A job is off the queue for the whole time a worker owns it, and
//! the requeue path only ever enqueues terminal jobs, so at most one worker
//! processes a given job at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::{EnqueueMode, GatewayConfig};
use crate::error::DispatchError;
use crate::pipeline::{JobEvent, Pipeline, PipelineContext, StoreProgress};
use crate::store::JobStore;

/// Liveness snapshot of the queue and pool.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatcherHealth {
    pub queue_open: bool,
    pub worker_count: usize,
    pub workers_alive: usize,
}

pub struct Dispatcher {
    ticket_tx: Sender<String>,
    workers: Vec<JoinHandle<()>>,
    closed: Arc<AtomicBool>,
    mode: EnqueueMode,
    worker_count: usize,
}

impl Dispatcher {
    /// Starts the worker pool.
    ///
    /// # Panics
    /// Panics if the configured worker count is 0.
    pub fn start(
        config: &GatewayConfig,
        store: Arc<JobStore>,
        pipeline: Arc<Pipeline>,
        events: Option<Arc<broadcast::Sender<JobEvent>>>,
    ) -> Self {
        assert!(config.worker_count > 0, "worker_count must be > 0");

        let (ticket_tx, ticket_rx) = bounded::<String>(config.queue_capacity);
        let closed = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(config.worker_count);
        for worker_id in 0..config.worker_count {
            let ticket_rx = ticket_rx.clone();
            let store = Arc::clone(&store);
            let pipeline = Arc::clone(&pipeline);
            let events = events.clone();

            let handle = thread::spawn(move || {
                run_worker(worker_id, ticket_rx, store, pipeline, events);
            });
            workers.push(handle);
        }

        info!("Started {} workers", config.worker_count);

        Self {
            ticket_tx,
            workers,
            closed,
            mode: config.enqueue_mode,
            worker_count: config.worker_count,
        }
    }

    /// Places a job reference onto the queue.
    ///
    /// With [`EnqueueMode::Block`] a full queue blocks the caller; with
    /// [`EnqueueMode::FailFast`] it fails immediately. A closed queue always
    /// fails fast.
    pub fn enqueue(&self, job_id: &str) -> Result<(), DispatchError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(DispatchError::QueueClosed);
        }

        match self.mode {
            EnqueueMode::Block => self
                .ticket_tx
                .send(job_id.to_string())
                .map_err(|_| DispatchError::QueueClosed),
            EnqueueMode::FailFast => {
                self.ticket_tx
                    .try_send(job_id.to_string())
                    .map_err(|e| match e {
                        TrySendError::Full(_) => DispatchError::QueueFull,
                        TrySendError::Disconnected(_) => DispatchError::QueueClosed,
                    })
            }
        }
    }

    /// Stops accepting new work. Jobs already on the queue still drain.
    pub fn close(&self) {
        info!("Dispatch queue closed");
        self.closed.store(true, Ordering::Relaxed);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    pub fn health(&self) -> DispatcherHealth {
        DispatcherHealth {
            queue_open: !self.is_closed(),
            worker_count: self.worker_count,
            workers_alive: self.workers.iter().filter(|h| !h.is_finished()).count(),
        }
    }

    /// Drain-and-stop: closes the queue, lets workers finish everything
    /// already enqueued, and joins the pool.
    pub fn join(self) {
        self.close();
        drop(self.ticket_tx);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }
}

fn run_worker(
    worker_id: usize,
    ticket_rx: Receiver<String>,
    store: Arc<JobStore>,
    pipeline: Arc<Pipeline>,
    events: Option<Arc<broadcast::Sender<JobEvent>>>,
) {
    debug!("Worker {} started", worker_id);

    while let Ok(job_id) = ticket_rx.recv() {
        // The job owns its record for the whole run; a ticket for a record
        // that disappeared or is not queued anymore is dropped.
        let job = match store.mark_processing(&job_id) {
            Ok(job) => job,
            Err(e) => {
                warn!("Worker {} skipping ticket for job {}: {}", worker_id, job_id, e);
                continue;
            }
        };

        debug!("Worker {} processing job {}", worker_id, job.id);
        let progress = StoreProgress::new(Arc::clone(&store), &job, events.clone());
        let ctx = PipelineContext::new(job);
        let (outcome, _ctx) = pipeline.run(ctx, &progress);

        if outcome.success {
            debug!("Worker {} finished job {}", worker_id, outcome.job_id);
        } else {
            warn!(
                "Worker {} job {} failed: {}",
                worker_id,
                outcome.job_id,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    debug!("Worker {} stopped", worker_id);
}
