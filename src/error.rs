//! Error types for scantag.
//!
//! Uses `thiserror` for ergonomic error definitions. Each layer gets its own
//! enum so that callers can decide which faults are fatal.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a tag bus transaction.
#[derive(Error, Debug)]
pub enum TagError {
    #[error("cannot connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("invalid tag id: {0}")]
    InvalidTag(String),

    #[error("read of {tag} failed: {reason}")]
    Read { tag: String, reason: String },

    #[error("write of {tag} failed: {reason}")]
    Write { tag: String, reason: String },

    #[error("unsupported tag value: {0}")]
    UnsupportedValue(String),
}

/// Result type alias for tag bus operations.
pub type TagResult<T> = Result<T, TagError>;

/// Errors raised by a serial channel.
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("cannot open serial port {port}: {reason}")]
    Open { port: String, reason: String },

    #[error("serial port {0} is closed")]
    Closed(String),

    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial worker failed: {0}")]
    Worker(String),
}

impl From<serialport::Error> for SerialError {
    fn from(e: serialport::Error) -> Self {
        SerialError::Io(e.into())
    }
}

/// Result type alias for serial operations.
pub type SerialResult<T> = Result<T, SerialError>;

/// Faults that terminate a scanner session.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("serial port could not be opened: {0}")]
    PortOpen(#[source] SerialError),

    #[error("serial transport fault: {0}")]
    Transport(#[source] SerialError),
}

/// Result type alias for session execution.
pub type SessionResult<T> = Result<T, SessionError>;

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine configuration directory")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("failed to write {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("invalid configuration format: {0}")]
    InvalidFormat(String),

    #[error("remote configuration unavailable: {0}")]
    Remote(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level CLI errors.
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for CLI commands.
pub type CliResult<T> = Result<T, CliError>;
