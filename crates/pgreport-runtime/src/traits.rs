//! Tool trait for the report pipeline stages

use pgreport_core::ServerConfig;
use std::path::Path;
use tokio::process::Command;

/// Builds the commands of the two pipeline stages
///
/// The pipeline configures stdio and process groups itself; implementations
/// only supply program, arguments and environment.
pub trait ReportTools: Send + Sync {
    /// Stage A: write the raw text of `log_file` to stdout
    fn fetch_command(&self, server: &ServerConfig, log_file: &str) -> Command;

    /// Stage B: read log text on stdin and write the report to `report_path`
    fn render_command(&self, report_path: &Path) -> Command;

    /// Programs that cannot be found (for startup diagnostics)
    fn missing_programs(&self) -> Vec<String> {
        Vec::new()
    }
}
