//! Image frames extracted from session recordings

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message timestamp (seconds + nanoseconds)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub secs: u32,
    pub nsecs: u32,
}

impl Timestamp {
    pub fn new(secs: u32, nsecs: u32) -> Self {
        Self { secs, nsecs }
    }

    /// Total nanoseconds since the epoch of the recording clock
    pub fn as_nanos(&self) -> u64 {
        self.secs as u64 * 1_000_000_000 + self.nsecs as u64
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.secs, self.nsecs)
    }
}

/// One image taken from a recording, ready to be sent to the detectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFrame {
    /// Sequence number from the message header
    pub seq: u32,

    /// Capture timestamp
    pub stamp: Timestamp,

    /// Image width in pixels
    pub width: u32,

    /// Image height in pixels
    pub height: u32,

    /// Pixel encoding (e.g. "rgb8", "bgr8")
    pub encoding: String,

    /// Raw image bytes
    pub data: Bytes,
}
