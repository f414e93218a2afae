//! pgreport Jobs - report job tracking and orchestration

pub mod service;
pub mod tracker;

pub use service::{ReportLaunch, ReportService};
pub use tracker::{JobGuard, JobTracker, ReportJob};
