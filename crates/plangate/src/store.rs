//! In-memory job registry.
//!
//! Single source of truth for job records. All mutation goes through
//! [`JobStore::update`], which holds the write lock for the whole closure so
//! concurrent updates to the same job never interleave field-by-field.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use crate::error::StoreError;
use crate::job::{AnalysisReport, Job, JobStatus, TaskKind};

#[derive(Default)]
struct StoreInner {
    jobs: HashMap<String, Job>,
    /// Insertion order for `list`.
    order: Vec<String>,
}

/// Concurrency-safe registry mapping job ids to job records.
#[derive(Default)]
pub struct JobStore {
    inner: RwLock<StoreInner>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Allocates a new queued job and returns a snapshot of the record.
    pub fn create(&self, filename: &str, tasks: Vec<TaskKind>) -> Job {
        let job = Job::new(filename, tasks);
        let mut inner = self.write();
        inner.order.push(job.id.clone());
        inner.jobs.insert(job.id.clone(), job.clone());
        log::debug!("Created job {}", job.id);
        job
    }

    /// Returns a snapshot of one job.
    pub fn get(&self, id: &str) -> Result<Job, StoreError> {
        self.read()
            .jobs
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    /// Returns snapshots of all jobs in creation order.
    pub fn list(&self) -> Vec<Job> {
        let inner = self.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.jobs.get(id).cloned())
            .collect()
    }

    /// Applies an atomic mutation to one job and bumps `updated_at`.
    ///
    /// The closure runs under the write lock; readers observe either the
    /// prior snapshot or the fully mutated one, never a half-written record.
    pub fn update<F>(&self, id: &str, mutate: F) -> Result<Job, StoreError>
    where
        F: FnOnce(&mut Job),
    {
        let mut inner = self.write();
        let job = inner
            .jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        mutate(job);
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    /// Validated status transition plus an extra mutation in the same write.
    fn transition_with<F>(&self, id: &str, next: JobStatus, mutate: F) -> Result<Job, StoreError>
    where
        F: FnOnce(&mut Job),
    {
        let mut inner = self.write();
        let job = inner
            .jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        if !job.status.allows(next) {
            return Err(StoreError::IllegalTransition {
                id: id.to_string(),
                from: job.status,
                to: next,
            });
        }
        log::debug!("Job {} moving {} -> {}", id, job.status, next);
        job.status = next;
        mutate(job);
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    /// Marks a queued job as picked up by a worker.
    pub fn mark_processing(&self, id: &str) -> Result<Job, StoreError> {
        self.transition_with(id, JobStatus::Processing, |_| {})
    }

    /// Records rasterization output on a processing job.
    pub fn record_pages(&self, id: &str, pages: Vec<PathBuf>) -> Result<Job, StoreError> {
        self.update(id, |job| {
            job.num_pages = Some(pages.len());
            job.page_images = pages;
        })
    }

    /// Terminal success: stores the report and clears any prior error.
    pub fn complete(&self, id: &str, report: AnalysisReport) -> Result<Job, StoreError> {
        self.transition_with(id, JobStatus::Done, |job| {
            job.result = Some(report);
            job.error = None;
        })
    }

    /// Terminal failure: stores the error and clears any prior result.
    pub fn fail(&self, id: &str, error: &str) -> Result<Job, StoreError> {
        self.transition_with(id, JobStatus::Failed, |job| {
            job.error = Some(error.to_string());
            job.result = None;
        })
    }

    /// Re-entry for a terminal job: appends the task (idempotent on the
    /// name) and moves the job back to `Queued`. Prior result/error stay in
    /// place until the rerun overwrites them.
    pub fn requeue(&self, id: &str, task: TaskKind) -> Result<Job, StoreError> {
        self.transition_with(id, JobStatus::Queued, |job| {
            job.push_task(task);
        })
    }

    /// Counts of (queued, processing, done, failed) jobs.
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        let inner = self.read();
        let mut queued = 0;
        let mut processing = 0;
        let mut done = 0;
        let mut failed = 0;
        for job in inner.jobs.values() {
            match job.status {
                JobStatus::Queued => queued += 1,
                JobStatus::Processing => processing += 1,
                JobStatus::Done => done += 1,
                JobStatus::Failed => failed += 1,
            }
        }
        (queued, processing, done, failed)
    }
}
