//! Error types and handling
//!
//! Common error types used across the pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::detection::DetectionError;
use crate::recording::SessionLoadError;
use crate::sink::SinkError;

/// Pipeline-wide error type
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Session load error: {0}")]
    SessionLoad(#[from] SessionLoadError),

    #[error("Detection service error: {0}")]
    Detection(#[from] DetectionError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Dispatcher stopped unexpectedly")]
    DispatcherStopped,
}

impl PipelineError {
    /// Whether the error must stop the process
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::Config(_) | PipelineError::DispatcherStopped
        )
    }
}

/// Error summary for run reports
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: String,
    pub message: String,
}

impl From<&PipelineError> for ErrorReport {
    fn from(error: &PipelineError) -> Self {
        let code = match error {
            PipelineError::Io(_) => "IO_ERROR",
            PipelineError::Serialization(_) => "SERIALIZATION_ERROR",
            PipelineError::Config(_) => "CONFIG_ERROR",
            PipelineError::SessionLoad(_) => "SESSION_LOAD_ERROR",
            PipelineError::Detection(_) => "DETECTION_ERROR",
            PipelineError::Sink(_) => "SINK_ERROR",
            PipelineError::DispatcherStopped => "DISPATCHER_STOPPED",
        };

        ErrorReport {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;
