//! Error types for record-store

use std::fmt;
use thiserror::Error;

/// Store error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// View requested on an index that was never registered
    UnknownIndex,
    /// Import operation for a source without an open session
    NoActiveSession,
    /// Identity not present in the store
    RecordNotFound,
    /// Malformed input (configuration values, field data)
    Parse,
    /// Configuration errors
    Config,
    /// I/O errors
    IO,
    /// Ingestion pipeline errors (worker gone, nothing to load)
    Ingest,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnknownIndex => "unknown_index",
            ErrorKind::NoActiveSession => "no_active_session",
            ErrorKind::RecordNotFound => "record_not_found",
            ErrorKind::Parse => "parse",
            ErrorKind::Config => "config",
            ErrorKind::IO => "io",
            ErrorKind::Ingest => "ingest",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Store error type
#[derive(Debug, Error)]
#[error("[{kind}] {message}")]
pub struct StoreError {
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub kind: ErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    // Convenience constructors
    pub fn unknown_index(name: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::UnknownIndex,
            format!("Index \"{}\" does not exist in store", name.into()),
        )
    }

    pub fn no_active_session(source: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::NoActiveSession,
            format!("No active import session for source: {}", source.into()),
        )
    }

    pub fn record_not_found(identity: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::RecordNotFound,
            format!("Record not found: {}", identity.into()),
        )
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IO, message)
    }

    pub fn ingest(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Ingest, message)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::io(format!("I/O error: {}", err)).with_source(err)
    }
}

impl From<serde_yaml::Error> for StoreError {
    fn from(err: serde_yaml::Error) -> Self {
        StoreError::config(format!("YAML error: {}", err)).with_source(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::parse(format!("JSON error: {}", err)).with_source(err)
    }
}

impl From<notify::Error> for StoreError {
    fn from(err: notify::Error) -> Self {
        StoreError::io(format!("Watcher error: {}", err)).with_source(err)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, StoreError>;
