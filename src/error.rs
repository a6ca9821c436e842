//! Error types for pgxport.
//!
//! One variant per pipeline stage, so the orchestrator can tell which stage
//! failed without inspecting messages.

use std::fmt;
use thiserror::Error;

/// Underlying cause kept behind an `ExportError`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a database session could not be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectFailure {
    /// The client side could not be set up (TLS, bad options, protocol).
    Client,
    /// The server rejected the credentials.
    Authentication,
    /// The server or database could not be reached.
    Network,
}

impl fmt::Display for ConnectFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Client => "client unavailable",
            Self::Authentication => "authentication failed",
            Self::Network => "server unreachable",
        };
        f.write_str(label)
    }
}

/// Main error type for export operations.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Configuration errors (missing file, malformed TOML, missing keys).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection errors.
    #[error("Connection error ({failure}): {message}")]
    Connection {
        failure: ConnectFailure,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Query execution errors, carrying the database message.
    #[error("Query error: {message}")]
    Query {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Spreadsheet serialization or file system errors.
    #[error("Write error: {message}")]
    Write {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl ExportError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a connection error with the given cause and message.
    pub fn connection(failure: ConnectFailure, msg: impl Into<String>) -> Self {
        Self::Connection {
            failure,
            message: msg.into(),
            source: None,
        }
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query {
            message: msg.into(),
            source: None,
        }
    }

    /// Creates a write error with the given message.
    pub fn write(msg: impl Into<String>) -> Self {
        Self::Write {
            message: msg.into(),
            source: None,
        }
    }

    /// Attaches the error that caused this one. Configuration errors carry
    /// no cause.
    pub fn with_source(mut self, cause: impl Into<BoxError>) -> Self {
        match &mut self {
            Self::Connection { source, .. }
            | Self::Query { source, .. }
            | Self::Write { source, .. } => *source = Some(cause.into()),
            Self::Config(_) => {}
        }
        self
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "Configuration Error",
            Self::Connection { .. } => "Connection Error",
            Self::Query { .. } => "Query Error",
            Self::Write { .. } => "Write Error",
        }
    }

    /// Returns true if the error happened before the pipeline started.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Result type alias using ExportError.
pub type Result<T> = std::result::Result<T, ExportError>;
