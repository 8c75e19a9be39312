//! Error types for trace-drain
//!
//! Every failing operation has its own variant so log lines can tell them
//! apart. [`DrainError::is_fatal`] splits them into the two policies the
//! pipeline knows: log and exit, or log and continue.

use std::fmt;
use thiserror::Error;

/// Result type alias for trace-drain operations
pub type Result<T> = std::result::Result<T, DrainError>;

/// Errors raised while draining traces into the time-series store
#[derive(Debug, Error)]
pub enum DrainError {
    /// Configuration could not be loaded or is invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// A store client or session could not be established
    #[error("connection error: {0}")]
    Connection(String),

    /// The source read query could not be opened
    #[error("source query error: {0}")]
    SourceQuery(String),

    /// Fetching a page or finishing the source iterator failed
    #[error("source stream error: {0}")]
    SourceStream(String),

    /// Truncating the source table failed
    #[error("truncate error: {0}")]
    Truncate(String),

    /// A record could not be turned into a point
    #[error("point error: {0}")]
    Point(String),

    /// Writing a batch to the destination failed
    #[error("write error: {0}")]
    Write(String),

    /// JSON error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DrainError {
    /// Whether this error must end the process instead of just the operation
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Connection(_)
                | Self::SourceQuery(_)
                | Self::SourceStream(_)
        )
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a source query error
    pub fn source_query(msg: impl Into<String>) -> Self {
        Self::SourceQuery(msg.into())
    }

    /// Create a source stream error
    pub fn source_stream(msg: impl Into<String>) -> Self {
        Self::SourceStream(msg.into())
    }

    /// Create a truncate error
    pub fn truncate(msg: impl Into<String>) -> Self {
        Self::Truncate(msg.into())
    }

    /// Create a point construction error
    pub fn point(msg: impl Into<String>) -> Self {
        Self::Point(msg.into())
    }

    /// Create a batch write error
    pub fn write(msg: impl Into<String>) -> Self {
        Self::Write(msg.into())
    }
}

/// Phase of the cycle controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleState {
    /// Waiting for the next tick
    #[default]
    Idle,
    /// A drain cycle is in progress
    Draining,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Draining => write!(f, "draining"),
        }
    }
}
