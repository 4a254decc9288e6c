//! Error types for the telegram-warehouse library.
//!
//! This module provides custom error types using `thiserror` so each pipeline
//! stage can surface a specific, descriptive failure.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while scraping, loading or enriching.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Missing or invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed partition file
    #[error("Malformed partition file {path}: {source}")]
    MalformedPartition {
        /// File that failed to parse
        path: PathBuf,
        /// Underlying parse error
        source: serde_json::Error,
    },

    /// CSV reading/writing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Warehouse errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration errors
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Network errors talking to the platform
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The platform answered, but not with something usable
    #[error("Platform error for channel {channel}: {message}")]
    Platform {
        /// Channel being read
        channel: String,
        /// What went wrong
        message: String,
    },

    /// Image file whose name is not `{message-id}.{ext}`
    #[error("Image file name is not a message id: {0}")]
    InvalidImageName(PathBuf),

    /// Object detection failed for an image
    #[error("Detection failed for {path}: {message}")]
    Detection {
        /// Image being processed
        path: PathBuf,
        /// Failure detail
        message: String,
    },

    /// An external stage command failed or exited non-zero
    #[error("Stage {stage} failed running `{command}`: {message}")]
    StageFailed {
        /// Stage name
        stage: String,
        /// The command line that failed
        command: String,
        /// Exit status or spawn error
        message: String,
    },

    /// A stage of a full run failed; wraps the underlying error
    #[error("Stage {stage} failed: {source}")]
    Stage {
        /// Stage name
        stage: &'static str,
        /// Underlying failure
        #[source]
        source: Box<PipelineError>,
    },

    /// A cancellation request was observed between messages
    #[error("Cancelled during {0}")]
    Cancelled(String),
}

/// Convenience type alias for Result with `PipelineError`
pub type Result<T> = std::result::Result<T, PipelineError>;

impl From<config::ConfigError> for PipelineError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<glob::PatternError> for PipelineError {
    fn from(err: glob::PatternError) -> Self {
        Self::Config(format!("invalid discovery pattern: {err}"))
    }
}

impl From<glob::GlobError> for PipelineError {
    fn from(err: glob::GlobError) -> Self {
        Self::Io(err.into_error())
    }
}
