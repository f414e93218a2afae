//! Error types for pgreport

use std::path::PathBuf;

/// pgreport error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Server not found: {0}")]
    ServerNotFound(String),

    #[error("Report not found: {0}")]
    ReportNotFound(String),

    #[error("No active report generation found: {0}")]
    JobNotRunning(String),

    #[error("Report generation already in progress: {0}")]
    AlreadyRunning(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Process failed to start: {0}")]
    ProcessStartFailed(String),

    #[error("Failed to stop report generation: {0}")]
    ProcessSignal(String),

    #[error("Database error: {0}")]
    DbError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Result type alias for pgreport
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification used at the request boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    Internal,
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::ConfigError(msg.into())
    }

    pub fn db<S: Into<String>>(msg: S) -> Self {
        Error::DbError(msg.into())
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Error::Validation(msg.into())
    }

    pub fn process_start<S: Into<String>>(msg: S) -> Self {
        Error::ProcessStartFailed(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ServerNotFound(_) | Error::ReportNotFound(_) | Error::JobNotRunning(_) => {
                ErrorKind::NotFound
            }
            Error::AlreadyRunning(_) => ErrorKind::Conflict,
            Error::Validation(_) => ErrorKind::Validation,
            _ => ErrorKind::Internal,
        }
    }
}
