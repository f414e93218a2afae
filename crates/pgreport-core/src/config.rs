//! Configuration file parsing for pgreport
//!
//! Supports multiple configuration file formats:
//! - YAML (.yaml, .yml)
//! - TOML (.toml)
//! - JSON (.json)

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::error::{Error, Result};
use crate::types::{validate_server_name, ServerConfig};

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(ConfigFormat::Toml),
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "json" => Some(ConfigFormat::Json),
            _ => None,
        }
    }

    /// Detect format from file path
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

fn default_service_port() -> u16 {
    DEFAULT_SERVICE_PORT
}

fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_string()
}

fn default_report_dir() -> PathBuf {
    PathBuf::from(DEFAULT_REPORT_DIR)
}

fn default_psql() -> String {
    DEFAULT_PSQL_BIN.to_string()
}

fn default_pgbadger() -> String {
    DEFAULT_PGBADGER_BIN.to_string()
}

fn default_pgbadger_args() -> Vec<String> {
    DEFAULT_PGBADGER_ARGS.iter().map(|s| s.to_string()).collect()
}

/// External tools used by the report pipeline
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolsConfig {
    /// psql binary fetching the raw log text
    #[serde(default = "default_psql")]
    pub psql: String,
    /// Report generator binary (or interpreter, e.g. `perl`)
    #[serde(default = "default_pgbadger")]
    pub pgbadger: String,
    /// Arguments placed before `-o <report> -`
    #[serde(default = "default_pgbadger_args")]
    pub pgbadger_args: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            psql: default_psql(),
            pgbadger: default_pgbadger(),
            pgbadger_args: default_pgbadger_args(),
        }
    }
}

/// Service configuration file structure
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_port")]
    pub this_service_port: u16,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
}

impl ServiceConfig {
    /// Load config from file, automatically detecting format from extension
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }

        let format = ConfigFormat::from_path(path).ok_or_else(|| {
            Error::ConfigError(format!(
                "Unsupported config file extension: {}. Expected .yaml, .yml, .toml, or .json",
                path.display()
            ))
        })?;

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, format)
    }

    /// Parse config content with specified format and validate it
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        let config: ServiceConfig = match format {
            ConfigFormat::Toml => toml::from_str(content)?,
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Json => serde_json::from_str(content)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Find and load a config file below `dir`
    pub fn find_and_load(dir: &Path) -> Result<(Self, PathBuf)> {
        for name in CONFIG_FILES {
            let path = dir.join(name);
            if path.exists() {
                let config = Self::load(&path)?;
                return Ok((config, path));
            }
        }
        Err(Error::ConfigError(format!(
            "No config file found in {}. Expected one of: {:?}",
            dir.display(),
            CONFIG_FILES
        )))
    }

    /// Check invariants the rest of the service relies on
    pub fn validate(&self) -> Result<()> {
        if self.this_service_port == 0 {
            return Err(Error::config("this_service_port must be non-zero"));
        }

        let mut seen = HashSet::new();
        for server in &self.servers {
            if !validate_server_name(&server.name) {
                return Err(Error::config(format!(
                    "Invalid server name '{}': only letters, digits, '.', '_' and '-' are allowed",
                    server.name
                )));
            }
            if !seen.insert(server.name.as_str()) {
                return Err(Error::config(format!(
                    "Duplicate server name: {}",
                    server.name
                )));
            }
            if server.host.is_empty() {
                return Err(Error::config(format!("Server '{}' has no host", server.name)));
            }
        }

        Ok(())
    }

    /// Create the report root and one directory per server
    pub fn provision_report_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.report_dir).map_err(|e| {
            Error::config(format!(
                "Failed to create report directory {}: {}",
                self.report_dir.display(),
                e
            ))
        })?;

        for server in &self.servers {
            let dir = server.report_dir(&self.report_dir);
            std::fs::create_dir_all(&dir).map_err(|e| {
                Error::config(format!(
                    "Failed to create server report directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        Ok(())
    }

    /// Listen address as `host:port`
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.this_service_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SslMode;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const YAML_CONFIG: &str = r#"
this_service_port: 9090
report_dir: /var/lib/pgreport
servers:
  - name: pg1
    host: db1.internal
    port: 5433
    user: postgres
    password: secret
    database: postgres
    sslmode: require
  - name: pg2
    host: db2.internal
    user: monitor
    database: app
"#;

    #[test]
    fn test_config_format_detection() {
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("yaml"), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_extension("YML"), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("txt"), None);
    }

    #[test]
    fn test_config_parse_yaml() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(YAML_CONFIG.as_bytes()).unwrap();

        let config = ServiceConfig::load(file.path()).unwrap();
        assert_eq!(config.this_service_port, 9090);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.report_dir, PathBuf::from("/var/lib/pgreport"));
        assert_eq!(config.servers.len(), 2);

        let pg1 = &config.servers[0];
        assert_eq!(pg1.name, "pg1");
        assert_eq!(pg1.port, 5433);
        assert_eq!(pg1.password, "secret");
        assert_eq!(pg1.ssl_mode, SslMode::Require);
        assert_eq!(pg1.log_directory, "pg_log");

        let pg2 = &config.servers[1];
        assert_eq!(pg2.port, 5432);
        assert!(pg2.password.is_empty());
        assert_eq!(pg2.ssl_mode, SslMode::Prefer);

        assert_eq!(config.tools, ToolsConfig::default());
        assert_eq!(config.listen_addr(), "0.0.0.0:9090");
    }

    #[test]
    fn test_config_parse_toml() {
        let content = r#"
this_service_port = 8081
report_dir = "reports"

[tools]
pgbadger = "perl"
pgbadger_args = ["pgbadger", "-f", "stderr"]

[[servers]]
name = "pg1"
host = "localhost"
user = "postgres"
database = "postgres"
sslmode = "disable"
log_directory = "log"
"#;
        let config = ServiceConfig::parse(content, ConfigFormat::Toml).unwrap();
        assert_eq!(config.this_service_port, 8081);
        assert_eq!(config.tools.pgbadger, "perl");
        assert_eq!(config.tools.pgbadger_args, vec!["pgbadger", "-f", "stderr"]);
        assert_eq!(config.tools.psql, "psql");
        assert_eq!(config.servers[0].ssl_mode, SslMode::Disable);
        assert_eq!(config.servers[0].log_directory, "log");
    }

    #[test]
    fn test_config_parse_json() {
        let content = r#"
{
    "this_service_port": 8082,
    "report_dir": "reports",
    "servers": [
        { "name": "pg1", "host": "localhost", "user": "postgres", "database": "postgres" }
    ]
}
"#;
        let config = ServiceConfig::parse(content, ConfigFormat::Json).unwrap();
        assert_eq!(config.this_service_port, 8082);
        assert_eq!(config.servers.len(), 1);
    }

    #[test]
    fn test_config_not_found() {
        let result = ServiceConfig::load(Path::new("/nonexistent/config.yaml"));
        assert!(matches!(result, Err(Error::ConfigNotFound(_))));
    }

    #[test]
    fn test_config_unsupported_extension() {
        let file = NamedTempFile::with_suffix(".ini").unwrap();
        let result = ServiceConfig::load(file.path());
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_config_rejects_duplicate_servers() {
        let content = r#"
servers:
  - { name: pg1, host: a, user: u, database: d }
  - { name: pg1, host: b, user: u, database: d }
"#;
        let err = ServiceConfig::parse(content, ConfigFormat::Yaml).unwrap_err();
        assert!(err.to_string().contains("Duplicate server name"));
    }

    #[test]
    fn test_config_rejects_path_like_server_name() {
        let content = r#"
servers:
  - { name: "../etc", host: a, user: u, database: d }
"#;
        let err = ServiceConfig::parse(content, ConfigFormat::Yaml).unwrap_err();
        assert!(err.to_string().contains("Invalid server name"));
    }

    #[test]
    fn test_config_rejects_bad_sslmode() {
        let content = r#"
servers:
  - { name: pg1, host: a, user: u, database: d, sslmode: sometimes }
"#;
        assert!(matches!(
            ServiceConfig::parse(content, ConfigFormat::Yaml),
            Err(Error::YamlError(_))
        ));
    }

    #[test]
    fn test_provision_report_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let content = format!(
            "report_dir: {}\nservers:\n  - {{ name: pg1, host: a, user: u, database: d }}\n  - {{ name: pg2, host: b, user: u, database: d }}\n",
            dir.path().join("report").display()
        );
        let config = ServiceConfig::parse(&content, ConfigFormat::Yaml).unwrap();
        config.provision_report_dirs().unwrap();

        assert!(dir.path().join("report/pg1").is_dir());
        assert!(dir.path().join("report/pg2").is_dir());
    }

    #[test]
    fn test_find_and_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("config")).unwrap();
        std::fs::write(dir.path().join("config/config.toml"), "this_service_port = 7000\n").unwrap();

        let (config, path) = ServiceConfig::find_and_load(dir.path()).unwrap();
        assert_eq!(config.this_service_port, 7000);
        assert!(path.ends_with("config/config.toml"));

        let empty = tempfile::tempdir().unwrap();
        assert!(ServiceConfig::find_and_load(empty.path()).is_err());
    }
}
