//! pgreport Database - log file listing on target servers

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use native_tls::TlsConnector;
use pgreport_core::{constants, Error, LogFileInfo, Result, ServerConfig, SslMode};
use postgres_native_tls::MakeTlsConnector;
use tokio_postgres::config::SslMode as PgSslMode;
use tokio_postgres::Row;
use tracing::{debug, info, warn};

/// Rotated `*.log` files in the server's log directory, oldest first
pub const LIST_LOGS_QUERY: &str =
    "SELECT name, size, modification FROM pg_ls_logdir() WHERE name LIKE '%.log' ORDER BY modification";

/// Source of log file listings for a target server
#[async_trait]
pub trait LogSource: Send + Sync {
    /// List the server's rotated log files ordered by modification time
    async fn list_logs(&self, server: &ServerConfig) -> Result<Vec<LogFileInfo>>;
}

/// Lists log files over a short-lived PostgreSQL connection
#[derive(Debug, Default, Clone, Copy)]
pub struct PgLogLister;

impl PgLogLister {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LogSource for PgLogLister {
    async fn list_logs(&self, server: &ServerConfig) -> Result<Vec<LogFileInfo>> {
        let config = connect_config(server);
        let tls = tls_connector(server.ssl_mode)?;

        debug!(
            "Connecting to {}:{} as {} (sslmode={})",
            server.host, server.port, server.user, server.ssl_mode
        );

        let (client, connection) = config
            .connect(tls)
            .await
            .map_err(|e| Error::db(format!("Failed to connect to database: {}", e)))?;

        let server_name = server.name.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!("Connection to {} closed with error: {}", server_name, e);
            }
        });

        let rows = client
            .query(LIST_LOGS_QUERY, &[])
            .await
            .map_err(|e| Error::db(format!("Failed to get logs: {}", e)))?;

        let logs: Vec<LogFileInfo> = rows
            .iter()
            .filter_map(|row| match row_to_log(row) {
                Ok(log) => Some(log),
                Err(e) => {
                    warn!("Skipping log row from {}: {}", server.name, e);
                    None
                }
            })
            .collect();

        info!("Listed {} log files on {}", logs.len(), server.name);
        Ok(logs)
    }
}

fn row_to_log(row: &Row) -> std::result::Result<LogFileInfo, tokio_postgres::Error> {
    Ok(LogFileInfo {
        name: row.try_get("name")?,
        size: row.try_get("size")?,
        modified_at: row.try_get::<_, DateTime<Utc>>("modification")?,
    })
}

/// Connection parameters for a target server
pub fn connect_config(server: &ServerConfig) -> tokio_postgres::Config {
    let mut config = tokio_postgres::Config::new();
    config
        .host(&server.host)
        .port(server.port)
        .user(&server.user)
        .dbname(&server.database)
        .application_name("pgreport")
        .connect_timeout(constants::PG_CONNECT_TIMEOUT)
        .ssl_mode(pg_ssl_mode(server.ssl_mode));
    if !server.password.is_empty() {
        config.password(&server.password);
    }
    config
}

/// Closest sslmode tokio-postgres supports
pub fn pg_ssl_mode(mode: SslMode) -> PgSslMode {
    match mode {
        SslMode::Disable => PgSslMode::Disable,
        SslMode::Allow | SslMode::Prefer => PgSslMode::Prefer,
        SslMode::Require | SslMode::VerifyCa | SslMode::VerifyFull => PgSslMode::Require,
    }
}

/// TLS connector honouring the verification level of the sslmode.
/// Unused by tokio-postgres when the mode is `disable`.
fn tls_connector(mode: SslMode) -> Result<MakeTlsConnector> {
    let connector = TlsConnector::builder()
        .danger_accept_invalid_certs(!mode.verifies_certificate())
        .danger_accept_invalid_hostnames(mode != SslMode::VerifyFull)
        .build()
        .map_err(|e| Error::db(format!("Failed to build TLS connector: {}", e)))?;
    Ok(MakeTlsConnector::new(connector))
}
