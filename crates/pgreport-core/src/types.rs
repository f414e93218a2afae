//! Core types for pgreport

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::constants::*;
use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

fn default_pg_port() -> u16 {
    DEFAULT_PG_PORT
}

fn default_log_directory() -> String {
    DEFAULT_PG_LOG_DIRECTORY.to_string()
}

/// Server names become directory names under the report root
static SERVER_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_.-]+$").expect("Invalid server name regex"));

/// Log file names are embedded in the pg_read_file query
static LOG_FILE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_.-]+\.log$").expect("Invalid log file regex"));

/// Validate a server name to prevent path traversal
pub fn validate_server_name(name: &str) -> bool {
    SERVER_NAME_REGEX.is_match(name) && name != "." && name != ".."
}

/// Validate a log file name before it reaches the fetch query
pub fn validate_log_file_name(name: &str) -> bool {
    LOG_FILE_REGEX.is_match(name)
}

/// Validate a report file name (plain file name, no directories)
pub fn validate_report_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

/// libpq sslmode values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    Disable,
    Allow,
    #[default]
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

impl SslMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SslMode::Disable => "disable",
            SslMode::Allow => "allow",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
            SslMode::VerifyCa => "verify-ca",
            SslMode::VerifyFull => "verify-full",
        }
    }

    /// Whether the server certificate chain must be verified
    pub fn verifies_certificate(&self) -> bool {
        matches!(self, SslMode::VerifyCa | SslMode::VerifyFull)
    }
}

impl FromStr for SslMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "disable" => Ok(SslMode::Disable),
            "allow" => Ok(SslMode::Allow),
            "prefer" => Ok(SslMode::Prefer),
            "require" => Ok(SslMode::Require),
            "verify-ca" => Ok(SslMode::VerifyCa),
            "verify-full" => Ok(SslMode::VerifyFull),
            _ => Err(Error::config(format!("Invalid sslmode: {}", s))),
        }
    }
}

impl std::fmt::Display for SslMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A target PostgreSQL server. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub host: String,
    #[serde(default = "default_pg_port")]
    pub port: u16,
    pub user: String,
    /// Never serialized back out
    #[serde(default, skip_serializing)]
    pub password: String,
    pub database: String,
    #[serde(default, rename = "sslmode")]
    pub ssl_mode: SslMode,
    /// Server-side directory holding the rotated logs
    #[serde(default = "default_log_directory")]
    pub log_directory: String,
}

impl ServerConfig {
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        user: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port: DEFAULT_PG_PORT,
            user: user.into(),
            password: String::new(),
            database: database.into(),
            ssl_mode: SslMode::default(),
            log_directory: default_log_directory(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_ssl_mode(mut self, ssl_mode: SslMode) -> Self {
        self.ssl_mode = ssl_mode;
        self
    }

    /// Report directory of this server under the report root
    pub fn report_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.name)
    }
}

/// A rotated log file on a target server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogFileInfo {
    pub name: String,
    pub size: i64,
    #[serde(rename = "date")]
    pub modified_at: DateTime<Utc>,
}

/// One entry of a server's report directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub is_processing: bool,
}

/// Result of a report status query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ReportStatus {
    Completed {
        path: PathBuf,
        url: String,
    },
    Running {
        #[serde(rename = "startTime")]
        start_time: DateTime<Utc>,
        output: String,
    },
}

impl ReportStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ReportStatus::Running { .. })
    }
}

/// Artifact locations of one report
///
/// The report path is the job key. Every entry point (generate, status,
/// stop, listing) derives it through this type so they agree on the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    /// File name of the final artifact, e.g. `postgresql-2024-01-01.html`
    pub report_name: String,
    /// `<server dir>/<base>.html`
    pub report_path: PathBuf,
    /// `<server dir>/<base>.out`
    pub output_path: PathBuf,
}

impl ReportPaths {
    fn from_base(server_dir: &Path, base: &str) -> Self {
        let report_name = format!("{}.{}", base, REPORT_EXTENSION);
        Self {
            report_path: server_dir.join(&report_name),
            output_path: server_dir.join(format!("{}.{}", base, OUTPUT_EXTENSION)),
            report_name,
        }
    }

    /// Paths for a log file name (`x.log` -> `x.html` / `x.out`)
    pub fn for_log(server_dir: &Path, log_file: &str) -> Self {
        let base = log_file
            .strip_suffix(&format!(".{}", LOG_EXTENSION))
            .unwrap_or(log_file);
        Self::from_base(server_dir, base)
    }

    /// Paths for a report or output file name (`x.html` or `x.out`)
    pub fn for_report(server_dir: &Path, report_name: &str) -> Self {
        let base = report_name
            .strip_suffix(&format!(".{}", REPORT_EXTENSION))
            .or_else(|| report_name.strip_suffix(&format!(".{}", OUTPUT_EXTENSION)))
            .unwrap_or(report_name);
        Self::from_base(server_dir, base)
    }

    /// URL of the artifact under the static report route
    pub fn url(&self, server_name: &str) -> String {
        format!("{}/{}/{}", REPORT_URL_PREFIX, server_name, self.report_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_server_name() {
        assert!(validate_server_name("pg1"));
        assert!(validate_server_name("prod-db_2.eu"));
        assert!(!validate_server_name(""));
        assert!(!validate_server_name(".."));
        assert!(!validate_server_name("a/b"));
        assert!(!validate_server_name("a b"));
    }

    #[test]
    fn test_validate_log_file_name() {
        assert!(validate_log_file_name("postgresql-2024-01-01.log"));
        assert!(validate_log_file_name("postgresql-2024-01-01_000000.log"));
        assert!(!validate_log_file_name("postgresql.csv"));
        assert!(!validate_log_file_name("../etc/passwd.log"));
        assert!(!validate_log_file_name("x');DROP TABLE t;--.log"));
        assert!(!validate_log_file_name(".log"));
    }

    #[test]
    fn test_validate_report_name() {
        assert!(validate_report_name("x.html"));
        assert!(!validate_report_name(""));
        assert!(!validate_report_name(".."));
        assert!(!validate_report_name("../x.html"));
    }

    #[test]
    fn test_ssl_mode_parse_and_display() {
        assert_eq!("verify-full".parse::<SslMode>().unwrap(), SslMode::VerifyFull);
        assert_eq!("DISABLE".parse::<SslMode>().unwrap(), SslMode::Disable);
        assert!("bogus".parse::<SslMode>().is_err());
        assert_eq!(SslMode::VerifyCa.to_string(), "verify-ca");
        assert_eq!(SslMode::default(), SslMode::Prefer);
        assert!(SslMode::VerifyCa.verifies_certificate());
        assert!(!SslMode::Require.verifies_certificate());
    }

    #[test]
    fn test_server_config_hides_password() {
        let server = ServerConfig::new("pg1", "localhost", "postgres", "postgres")
            .with_password("secret");
        let json = serde_json::to_value(&server).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["sslmode"], "prefer");
        assert_eq!(json["port"], 5432);
    }

    #[test]
    fn test_report_paths_for_log() {
        let dir = Path::new("/reports/pg1");
        let paths = ReportPaths::for_log(dir, "postgresql-2024-01-01.log");
        assert_eq!(paths.report_name, "postgresql-2024-01-01.html");
        assert_eq!(paths.report_path, dir.join("postgresql-2024-01-01.html"));
        assert_eq!(paths.output_path, dir.join("postgresql-2024-01-01.out"));
    }

    #[test]
    fn test_report_paths_agree_between_entry_points() {
        let dir = Path::new("/reports/pg1");
        let from_log = ReportPaths::for_log(dir, "a.log");
        assert_eq!(ReportPaths::for_report(dir, "a.html"), from_log);
        assert_eq!(ReportPaths::for_report(dir, "a.out"), from_log);
        assert_eq!(from_log.url("pg1"), "/report/pg1/a.html");
    }

    #[test]
    fn test_report_status_serialization() {
        let status = ReportStatus::Completed {
            path: PathBuf::from("/r/pg1/a.html"),
            url: "/report/pg1/a.html".to_string(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["path"], "/r/pg1/a.html");
        assert!(!status.is_running());
    }

    #[test]
    fn test_client_field_names() {
        let now = Utc::now();
        let running = ReportStatus::Running {
            start_time: now,
            output: "working".to_string(),
        };
        let json = serde_json::to_value(&running).unwrap();
        assert_eq!(json["status"], "running");
        assert!(json.get("startTime").is_some());
        assert_eq!(json["output"], "working");

        let summary = ReportSummary {
            name: "a.html".to_string(),
            created_at: now,
            is_processing: true,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["isProcessing"], true);
        assert!(json.get("createdAt").is_some());

        let log = LogFileInfo {
            name: "a.log".to_string(),
            size: 10,
            modified_at: now,
        };
        let json = serde_json::to_value(&log).unwrap();
        assert!(json.get("date").is_some());
        assert!(json.get("modified_at").is_none());
    }
}
