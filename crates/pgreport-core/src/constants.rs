//! Constants and default values for pgreport

use std::time::Duration;

/// Default config file location, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

/// Default listen address
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_SERVICE_PORT: u16 = 8080;

/// Default report root directory
pub const DEFAULT_REPORT_DIR: &str = "report";

/// Default PostgreSQL port
pub const DEFAULT_PG_PORT: u16 = 5432;

/// Default server-side log directory passed to pg_read_file
pub const DEFAULT_PG_LOG_DIRECTORY: &str = "pg_log";

/// Default psql binary
pub const DEFAULT_PSQL_BIN: &str = "psql";

/// Default pgbadger binary
pub const DEFAULT_PGBADGER_BIN: &str = "pgbadger";

/// Default pgbadger arguments placed before `-o <report> -`
pub const DEFAULT_PGBADGER_ARGS: &[&str] = &["-f", "stderr", "-v"];

/// Extension of the final report artifact
pub const REPORT_EXTENSION: &str = "html";

/// Extension of the diagnostic output file
pub const OUTPUT_EXTENSION: &str = "out";

/// Extension of server log files
pub const LOG_EXTENSION: &str = "log";

/// URL prefix under which report artifacts are served
pub const REPORT_URL_PREFIX: &str = "/report";

/// Connect timeout for the log listing query
pub const PG_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Config file names probed when no path is given (in priority order)
pub const CONFIG_FILES: &[&str] = &[
    "config/config.yaml",
    "config/config.yml",
    "config/config.toml",
    "config/config.json",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path_is_probed_first() {
        assert_eq!(CONFIG_FILES[0], DEFAULT_CONFIG_PATH);
    }

    #[test]
    fn test_pgbadger_args_read_stderr_format() {
        assert_eq!(DEFAULT_PGBADGER_ARGS, &["-f", "stderr", "-v"]);
    }
}
