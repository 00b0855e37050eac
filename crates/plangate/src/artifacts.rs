//! On-disk artifact management.
//!
//! Each job owns a directory under the storage root:
//!
//! ```text
//! <root>/<job_id>/<filename>              original upload
//! <root>/<job_id>/workspace/pages/*.png   generated page images
//! ```
//!
//! Purging is best-effort: individual deletion failures are collected and
//! reported together instead of aborting the sweep.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Serialize;
use walkdir::WalkDir;

use crate::error::ArtifactError;

const WORKSPACE_DIR: &str = "workspace";
const PAGES_DIR: &str = "pages";

/// One path that could not be deleted during a purge.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of a purge sweep: what was removed and what resisted.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeReport {
    pub removed: Vec<PathBuf>,
    pub failures: Vec<PurgeFailure>,
}

impl PurgeReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }

    fn record(&mut self, path: &Path, result: std::io::Result<()>) {
        match result {
            Ok(()) => self.removed.push(path.to_path_buf()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!("Failed to remove {}: {}", path.display(), e);
                self.failures.push(PurgeFailure {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// Filesystem store for uploads and derived page images.
#[derive(Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn job_root(&self, job_id: &str) -> PathBuf {
        self.root.join(job_id)
    }

    fn pages_dir(&self, job_id: &str) -> PathBuf {
        self.job_root(job_id).join(WORKSPACE_DIR).join(PAGES_DIR)
    }

    fn ensure_directory(&self, path: &Path) -> Result<(), ArtifactError> {
        std::fs::create_dir_all(path).map_err(|e| ArtifactError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
        std::fs::write(path, bytes).map_err(|e| ArtifactError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Saves the uploaded document under the job root and returns its path.
    pub fn persist_upload(
        &self,
        job_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, ArtifactError> {
        let dir = self.job_root(job_id);
        self.ensure_directory(&dir)?;

        // Uploads may carry client path fragments; keep the basename only.
        let basename = Path::new(filename)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document.pdf".to_string());

        let destination = dir.join(basename);
        debug!(
            "Persisting upload for job {} to {}",
            job_id,
            destination.display()
        );
        self.write_bytes(&destination, bytes)?;
        Ok(destination)
    }

    /// Writes one rendered page image and returns its path.
    pub fn write_page_image(
        &self,
        job_id: &str,
        page_index: usize,
        bytes: &[u8],
    ) -> Result<PathBuf, ArtifactError> {
        let dir = self.pages_dir(job_id);
        self.ensure_directory(&dir)?;

        let destination = dir.join(format!("page-{page_index:04}.png"));
        self.write_bytes(&destination, bytes)?;
        debug!("Rendered page {} -> {}", page_index, destination.display());
        Ok(destination)
    }

    /// Deletes generated artifacts for a job; with `remove_original`, the
    /// uploaded document too. Idempotent: purging an unknown or already
    /// empty job succeeds with an empty report.
    pub fn purge(&self, job_id: &str, remove_original: bool) -> PurgeReport {
        let mut report = PurgeReport::default();
        let root = self.job_root(job_id);
        if !root.exists() {
            return report;
        }

        let workspace = root.join(WORKSPACE_DIR);
        if workspace.exists() {
            info!(
                "Purging workspace cache for job {} under {}",
                job_id,
                workspace.display()
            );
            remove_tree(&workspace, &mut report);
        }

        if remove_original {
            info!("Removing original upload for job {}", job_id);
            let entries = match std::fs::read_dir(&root) {
                Ok(entries) => entries,
                Err(e) => {
                    report.record(&root, Err(e));
                    return report;
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.file_name().map(|n| n == WORKSPACE_DIR).unwrap_or(false) {
                    continue;
                }
                if path.is_dir() {
                    remove_tree(&path, &mut report);
                } else {
                    report.record(&path, std::fs::remove_file(&path));
                }
            }
        }

        // Drop the job root once nothing is left in it.
        if std::fs::read_dir(&root)
            .map(|mut d| d.next().is_none())
            .unwrap_or(false)
        {
            let _ = std::fs::remove_dir(&root);
        }

        report
    }
}

/// Removes a directory tree, files first, collecting per-path outcomes.
fn remove_tree(tree: &Path, report: &mut PurgeReport) {
    for entry in WalkDir::new(tree).contents_first(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                report.failures.push(PurgeFailure {
                    path: e.path().map(Path::to_path_buf).unwrap_or_default(),
                    reason: e.to_string(),
                });
                continue;
            }
        };
        let path = entry.path();
        if entry.file_type().is_dir() {
            // Directory removal is bookkeeping, not an artifact; only track
            // failures.
            if let Err(e) = std::fs::remove_dir(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    report.failures.push(PurgeFailure {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    });
                }
            }
        } else {
            report.record(path, std::fs::remove_file(path));
        }
    }
}
