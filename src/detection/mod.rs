//! Landmark detection services
//!
//! - `HandDetector` / `PoseDetector` traits at the service boundary
//! - length-delimited JSON wire protocol
//! - TCP clients with a blocking readiness wait

pub mod client;
pub mod protocol;
pub mod traits;

pub use client::{RemoteHandDetector, RemotePoseDetector, ServiceClient};
pub use traits::{DetectionError, DetectionResult, HandDetector, PoseDetector};
