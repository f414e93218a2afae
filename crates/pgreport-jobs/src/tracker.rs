//! In-memory registry of running report jobs

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use pgreport_core::{Error, ReportPaths, Result};
use pgreport_runtime::ProcessGroups;
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// One in-flight report pipeline
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportJob {
    pub id: Uuid,
    pub report_path: PathBuf,
    pub output_path: PathBuf,
    pub started_at: DateTime<Utc>,
    #[serde(skip)]
    pub processes: ProcessGroups,
}

impl ReportJob {
    pub fn new(paths: &ReportPaths) -> Self {
        Self {
            id: Uuid::new_v4(),
            report_path: paths.report_path.clone(),
            output_path: paths.output_path.clone(),
            started_at: Utc::now(),
            processes: ProcessGroups::new(),
        }
    }
}

/// Maps a report path to its running job
///
/// At most one job exists per report path. Cloning shares the map.
#[derive(Debug, Clone, Default)]
pub struct JobTracker {
    jobs: Arc<RwLock<HashMap<PathBuf, ReportJob>>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `job` unless one is already registered for its report path
    pub fn try_register(&self, job: ReportJob) -> Result<()> {
        match self.jobs.write().entry(job.report_path.clone()) {
            Entry::Occupied(entry) => Err(Error::AlreadyRunning(entry.key().display().to_string())),
            Entry::Vacant(entry) => {
                debug!("Registered job {} for {}", job.id, job.report_path.display());
                entry.insert(job);
                Ok(())
            }
        }
    }

    pub fn lookup(&self, report_path: &Path) -> Option<ReportJob> {
        self.jobs.read().get(report_path).cloned()
    }

    pub fn is_registered(&self, report_path: &Path) -> bool {
        self.jobs.read().contains_key(report_path)
    }

    /// Remove whatever job is registered at `report_path`; idempotent
    pub fn unregister(&self, report_path: &Path) -> Option<ReportJob> {
        self.jobs.write().remove(report_path)
    }

    /// Remove the entry only if it still belongs to job `id`
    pub fn release(&self, report_path: &Path, id: Uuid) -> bool {
        let mut jobs = self.jobs.write();
        match jobs.get(report_path) {
            Some(job) if job.id == id => {
                jobs.remove(report_path);
                debug!("Released job {} for {}", id, report_path.display());
                true
            }
            _ => false,
        }
    }

    /// Snapshot of all registered jobs, ordered by report path
    pub fn list_all(&self) -> Vec<(PathBuf, ReportJob)> {
        let mut jobs: Vec<_> = self
            .jobs
            .read()
            .iter()
            .map(|(path, job)| (path.clone(), job.clone()))
            .collect();
        jobs.sort_by(|a, b| a.0.cmp(&b.0));
        jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }
}

/// Releases a job's tracker entry when dropped
///
/// Held by the pipeline task, so the entry goes away exactly once however
/// the task ends.
#[derive(Debug)]
pub struct JobGuard {
    tracker: JobTracker,
    report_path: PathBuf,
    id: Uuid,
}

impl JobGuard {
    pub fn new(tracker: JobTracker, job: &ReportJob) -> Self {
        Self {
            tracker,
            report_path: job.report_path.clone(),
            id: job.id,
        }
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.tracker.release(&self.report_path, self.id);
    }
}
