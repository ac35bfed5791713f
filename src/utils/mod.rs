//! Shared utilities

pub mod error;
pub mod fs;

pub use error::{PipelineError, PipelineResult};
