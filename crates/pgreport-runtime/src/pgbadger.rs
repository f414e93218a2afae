//! psql + pgbadger tools

use pgreport_core::{ServerConfig, ToolsConfig};
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::traits::ReportTools;

/// Fetches log text with psql and renders it with pgbadger
#[derive(Debug, Clone, Default)]
pub struct PgBadgerTools {
    config: ToolsConfig,
}

impl PgBadgerTools {
    pub fn new(config: ToolsConfig) -> Self {
        Self { config }
    }

    /// Query returning the whole log file as a single text value
    pub fn read_file_query(server: &ServerConfig, log_file: &str) -> String {
        let path = format!("{}/{}", server.log_directory, log_file);
        format!("SELECT pg_read_file({})", quote_literal(&path))
    }
}

/// SQL string literal with embedded quotes doubled
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl ReportTools for PgBadgerTools {
    fn fetch_command(&self, server: &ServerConfig, log_file: &str) -> Command {
        let query = Self::read_file_query(server, log_file);
        debug!(
            "{} -h {} -p {} -U {} -d {} -c \"{}\"",
            self.config.psql, server.host, server.port, server.user, server.database, query
        );

        let mut cmd = Command::new(&self.config.psql);
        // -X: no psqlrc, -w: never prompt, -A -q: bare unaligned output
        cmd.args(["-X", "-w", "-A", "-q"])
            .arg("-h")
            .arg(&server.host)
            .arg("-p")
            .arg(server.port.to_string())
            .arg("-U")
            .arg(&server.user)
            .arg("-d")
            .arg(&server.database)
            .arg("-c")
            .arg(query)
            .env("PGSSLMODE", server.ssl_mode.as_str())
            .env_remove("PGLOCALEDIR");
        if !server.password.is_empty() {
            cmd.env("PGPASSWORD", &server.password);
        }
        cmd
    }

    fn render_command(&self, report_path: &Path) -> Command {
        debug!(
            "{} {} -o {} -",
            self.config.pgbadger,
            self.config.pgbadger_args.join(" "),
            report_path.display()
        );

        let mut cmd = Command::new(&self.config.pgbadger);
        cmd.args(&self.config.pgbadger_args)
            .arg("-o")
            .arg(report_path)
            .arg("-");
        cmd
    }

    fn missing_programs(&self) -> Vec<String> {
        [&self.config.psql, &self.config.pgbadger]
            .into_iter()
            .filter(|program| which::which(program.as_str()).is_err() && !Path::new(program.as_str()).exists())
            .cloned()
            .collect()
    }
}
