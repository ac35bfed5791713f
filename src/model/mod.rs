//! Shared data model
//!
//! Frames flowing into the detectors and the annotations flowing out.

pub mod annotation;
pub mod frame;

pub use annotation::{
    CombinedAnnotation, HandDetection, Handedness, Landmark, PoseDetection, SessionDataset,
};
pub use frame::{ImageFrame, Timestamp};
