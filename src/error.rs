//! Error types for rolling_writer
//!
//! This module defines all error types used throughout the crate. It provides
//! a unified error handling system with proper error chaining and a mapping
//! onto `std::io::Error` for the `std::io::Write` surface.

use std::io;
use thiserror::Error;

/// Main error type for rolling writer operations
#[derive(Error, Debug)]
pub enum RollingWriterError {
    /// Malformed configuration or argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Write or close attempted after the writer was closed
    #[error("Write on closed writer")]
    Closed,

    /// I/O errors (open, write, rename, remove)
    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: io::Error,
    },

    /// File rotation errors (rename of the active file, reopening it)
    #[error("File rotation error: {0}")]
    RotationError(String),

    /// Compression of a retired file failed
    #[error("Compression error: {0}")]
    CompressionError(String),

    /// JSON configuration parsing errors
    #[error("JSON parsing error: {source}")]
    JsonError {
        #[from]
        source: serde_json::Error,
    },

    /// YAML configuration parsing errors
    #[error("YAML parsing error: {source}")]
    YamlError {
        #[from]
        source: serde_yaml::Error,
    },

    /// TOML configuration parsing errors
    #[error("TOML parsing error: {source}")]
    TomlError {
        #[from]
        source: toml::de::Error,
    },

    /// Generic internal errors
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Result type alias for rolling writer operations
pub type Result<T> = std::result::Result<T, RollingWriterError>;

impl RollingWriterError {
    /// Create a new invalid argument error
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a new rotation error
    pub fn rotation<S: Into<String>>(msg: S) -> Self {
        Self::RotationError(msg.into())
    }

    /// Create a new compression error
    pub fn compression<S: Into<String>>(msg: S) -> Self {
        Self::CompressionError(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::InternalError(msg.into())
    }

    /// Check if this error is recoverable
    ///
    /// A recoverable error leaves the writer usable: the next write may
    /// succeed once the underlying condition clears.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::IoError { .. } => true,
            Self::RotationError(_) => true,
            Self::CompressionError(_) => true,
            Self::Closed => false,
            Self::InvalidArgument(_) => false,
            _ => false,
        }
    }

    /// Get the error category for logging purposes
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "config",
            Self::Closed => "closed",
            Self::IoError { .. } => "io",
            Self::RotationError(_) => "rotation",
            Self::CompressionError(_) => "compression",
            Self::JsonError { .. } | Self::YamlError { .. } | Self::TomlError { .. } => {
                "serialization"
            }
            Self::InternalError(_) => "internal",
        }
    }
}

impl From<RollingWriterError> for io::Error {
    fn from(err: RollingWriterError) -> Self {
        match err {
            RollingWriterError::IoError { source } => source,
            RollingWriterError::Closed => io::Error::new(io::ErrorKind::BrokenPipe, err),
            RollingWriterError::InvalidArgument(_) => {
                io::Error::new(io::ErrorKind::InvalidInput, err)
            }
            other => io::Error::other(other),
        }
    }
}
