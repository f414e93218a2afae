//! Report orchestration: launch, stop, inspect

use chrono::{DateTime, Utc};
use pgreport_core::{
    constants::{OUTPUT_EXTENSION, REPORT_EXTENSION},
    validate_log_file_name, validate_report_name, validate_server_name, Error, ReportPaths,
    ReportStatus, ReportSummary, Result, ServerRegistry,
};
use pgreport_runtime::{spawn_pipeline, PipelineExit, ReportTools};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::tracker::{JobGuard, JobTracker, ReportJob};

/// An accepted report generation request
#[derive(Debug)]
pub struct ReportLaunch {
    pub report_name: String,
    pub report_path: PathBuf,
    /// Pipeline task; the tracker entry is released when it finishes
    pub completion: JoinHandle<PipelineExit>,
}

/// Launches, stops and inspects report jobs
pub struct ReportService {
    registry: ServerRegistry,
    report_dir: PathBuf,
    tracker: JobTracker,
    tools: Arc<dyn ReportTools>,
}

impl ReportService {
    pub fn new(
        registry: ServerRegistry,
        report_dir: impl Into<PathBuf>,
        tools: Arc<dyn ReportTools>,
    ) -> Self {
        Self {
            registry,
            report_dir: report_dir.into(),
            tracker: JobTracker::new(),
            tools,
        }
    }

    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    pub fn report_dir(&self) -> &Path {
        &self.report_dir
    }

    /// Start generating the report for `log_file` on `server_name`
    ///
    /// Returns as soon as both stages are running. The job is registered
    /// before anything is spawned and released by the pipeline task.
    pub async fn generate(&self, server_name: &str, log_file: &str) -> Result<ReportLaunch> {
        if log_file.is_empty() {
            return Err(Error::validation("Log file not specified"));
        }
        if !validate_log_file_name(log_file) {
            return Err(Error::validation(format!("Invalid log file name: {}", log_file)));
        }

        let server = self.registry.find(server_name)?.clone();
        let server_dir = server.report_dir(&self.report_dir);
        tokio::fs::create_dir_all(&server_dir).await?;

        let paths = ReportPaths::for_log(&server_dir, log_file);
        let job = ReportJob::new(&paths);
        self.tracker.try_register(job.clone())?;
        let guard = JobGuard::new(self.tracker.clone(), &job);

        info!("Generating report {} for {}", paths.report_name, server.name);

        // On error the guard is dropped here and releases the job
        let pipeline = spawn_pipeline(self.tools.as_ref(), &server, log_file, &paths, &job.processes)
            .map_err(|e| {
                error!("Failed to start pipeline for {}: {}", paths.report_name, e);
                e
            })?;

        let completion = tokio::spawn(async move {
            let _guard = guard;
            pipeline.run().await
        });

        Ok(ReportLaunch {
            report_name: paths.report_name,
            report_path: paths.report_path,
            completion,
        })
    }

    /// Kill the running pipeline of a report
    ///
    /// The job is unregistered even when no signal could be delivered.
    pub fn stop(&self, server_name: &str, report_name: &str) -> Result<()> {
        let paths = self.resolve(server_name, report_name)?;
        let job = self
            .tracker
            .lookup(&paths.report_path)
            .ok_or_else(|| Error::JobNotRunning(report_name.to_string()))?;

        info!("Stopping report generation for {}/{}", server_name, paths.report_name);
        let result = job.processes.terminate();
        self.tracker.release(&paths.report_path, job.id);

        match result {
            Ok(count) => {
                info!("Killed {} process groups for {}", count, paths.report_name);
                Ok(())
            }
            Err(e) => {
                error!("Failed to stop {}: {}", paths.report_name, e);
                Err(e)
            }
        }
    }

    /// Kill every running pipeline; returns how many jobs were stopped
    pub fn stop_all(&self) -> usize {
        let jobs = self.tracker.list_all();
        for (path, job) in &jobs {
            if let Err(e) = job.processes.terminate() {
                warn!("Failed to stop {}: {}", path.display(), e);
            }
            self.tracker.release(path, job.id);
        }
        jobs.len()
    }

    /// Running with accumulated output, Completed if the artifact exists
    pub async fn status(&self, server_name: &str, report_name: &str) -> Result<ReportStatus> {
        let paths = self.resolve(server_name, report_name)?;

        if let Some(job) = self.tracker.lookup(&paths.report_path) {
            let output = match tokio::fs::read(&paths.output_path).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                // Registered but the pipeline has not created the file yet
                Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
                Err(e) => return Err(e.into()),
            };
            return Ok(ReportStatus::Running {
                start_time: job.started_at,
                output,
            });
        }

        match tokio::fs::metadata(&paths.report_path).await {
            Ok(meta) if meta.is_file() => Ok(ReportStatus::Completed {
                url: paths.url(server_name),
                path: paths.report_path,
            }),
            Ok(_) => Err(Error::ReportNotFound(report_name.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(Error::ReportNotFound(report_name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Reports and diagnostic files of a server, newest first
    pub async fn list_reports(&self, server_name: &str) -> Result<Vec<ReportSummary>> {
        if !validate_server_name(server_name) {
            return Err(Error::validation(format!("Invalid server name: {}", server_name)));
        }
        let dir = self.report_dir.join(server_name);

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut reports = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !matches!(
                path.extension().and_then(|e| e.to_str()),
                Some(REPORT_EXTENSION) | Some(OUTPUT_EXTENSION)
            ) {
                continue;
            }
            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };

            let name = entry.file_name().to_string_lossy().into_owned();
            let created_at = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            let is_processing = self
                .tracker
                .is_registered(&ReportPaths::for_report(&dir, &name).report_path);

            reports.push(ReportSummary {
                name,
                created_at,
                is_processing,
            });
        }

        reports.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(reports)
    }

    fn resolve(&self, server_name: &str, report_name: &str) -> Result<ReportPaths> {
        if !validate_server_name(server_name) {
            return Err(Error::validation(format!("Invalid server name: {}", server_name)));
        }
        if !validate_report_name(report_name) {
            return Err(Error::validation(format!("Invalid report name: {}", report_name)));
        }
        Ok(ReportPaths::for_report(
            &self.report_dir.join(server_name),
            report_name,
        ))
    }
}
