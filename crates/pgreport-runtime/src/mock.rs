//! Shell-script tools for exercising the pipeline without psql or pgbadger

use pgreport_core::ServerConfig;
use std::path::Path;
use tokio::process::Command;

use crate::traits::ReportTools;

/// Runs both stages as `sh -c` scripts
///
/// The fetch script sees `LOG_FILE` and `SERVER_NAME` in its environment;
/// the render script gets the report path as `$1`.
#[derive(Debug, Clone)]
pub struct ScriptTools {
    pub fetch_script: String,
    pub render_script: String,
}

impl ScriptTools {
    pub fn new(fetch_script: impl Into<String>, render_script: impl Into<String>) -> Self {
        Self {
            fetch_script: fetch_script.into(),
            render_script: render_script.into(),
        }
    }

    /// Emits psql-shaped output around `body` and copies stdin to the report
    pub fn echo(body: &str) -> Self {
        Self::new(
            format!("printf 'pg_read_file\\n%s\\n(1 row)\\n' '{}'", body),
            "cat > \"$1\"",
        )
    }

    /// Fetch stage that never finishes on its own; no report is written
    pub fn hanging() -> Self {
        Self::new("echo pg_read_file; sleep 30 & sleep 30; wait", "cat > /dev/null")
    }
}

impl ReportTools for ScriptTools {
    fn fetch_command(&self, server: &ServerConfig, log_file: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&self.fetch_script)
            .env("LOG_FILE", log_file)
            .env("SERVER_NAME", &server.name);
        cmd
    }

    fn render_command(&self, report_path: &Path) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&self.render_script).arg("sh").arg(report_path);
        cmd
    }
}
