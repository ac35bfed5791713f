//! Detection service trait definitions
//!
//! The hand and pose landmark services are opaque request/response
//! providers. The dispatcher only talks to them through these traits.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{HandDetection, ImageFrame, PoseDetection};

/// Failures of a single detection request
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed response: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Service disconnected")]
    Disconnected,

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("Service error: {0}")]
    Service(String),

    #[error("Request task failed: {0}")]
    Task(String),
}

pub type DetectionResult<T> = Result<T, DetectionError>;

/// Hand landmark service
#[async_trait]
pub trait HandDetector: Send + Sync {
    /// Block until the service accepts requests
    async fn wait_until_ready(&self) -> DetectionResult<()>;

    /// Detect zero or more hands in one frame
    async fn detect_hands(&self, frame: &ImageFrame) -> DetectionResult<Vec<HandDetection>>;
}

/// Body pose landmark service
#[async_trait]
pub trait PoseDetector: Send + Sync {
    /// Block until the service accepts requests
    async fn wait_until_ready(&self) -> DetectionResult<()>;

    /// Detect the pose in one frame, `None` when nobody is visible
    async fn detect_pose(&self, frame: &ImageFrame) -> DetectionResult<Option<PoseDetection>>;
}
