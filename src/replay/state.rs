//! Replay state management
//!
//! Defines the controller state machine and the per-session context.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;

use crate::model::{CombinedAnnotation, ImageFrame, SessionDataset};
use crate::recording::SessionId;

/// Current state of the replay controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayState {
    /// Sessions discovered, nothing loaded yet
    Idle,
    /// Reading the next recording
    Loading,
    /// Frames of the active session are being replayed
    Streaming,
    /// Frame queue empty, waiting for the flush
    Draining,
    /// Active session flushed
    Done,
    /// No sessions left
    Exhausted,
}

impl Default for ReplayState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Everything owned by the active session
///
/// Created when a session loads and consumed by the flush. The frame queue
/// belongs to the controller side, the dataset to the sink side.
#[derive(Debug)]
pub struct SessionContext {
    pub id: SessionId,
    pub path: PathBuf,
    pub(crate) frames: VecDeque<ImageFrame>,
    pub(crate) in_flight: Option<u32>,
    total_frames: usize,
    fed: usize,
    dataset: SessionDataset,
    gaps: Vec<u32>,
}

impl SessionContext {
    pub fn new(id: SessionId, path: PathBuf, frames: Vec<ImageFrame>) -> Self {
        let total_frames = frames.len();
        Self {
            id,
            path,
            frames: frames.into(),
            in_flight: None,
            total_frames,
            fed: 0,
            dataset: SessionDataset::new(),
            gaps: Vec::new(),
        }
    }

    /// Frames extracted from the recording
    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    /// Frames handed to the dispatcher so far
    pub fn frames_fed(&self) -> usize {
        self.fed
    }

    pub fn frames_remaining(&self) -> usize {
        self.frames.len()
    }

    /// Sequence number awaiting acknowledgment, if any
    pub fn in_flight(&self) -> Option<u32> {
        self.in_flight
    }

    pub fn dataset(&self) -> &SessionDataset {
        &self.dataset
    }

    /// Sequence numbers of frames that produced no record
    pub fn gaps(&self) -> &[u32] {
        &self.gaps
    }

    pub(crate) fn mark_fed(&mut self, seq: u32) {
        self.fed += 1;
        self.in_flight = Some(seq);
    }

    /// Forget a published frame that was never dispatched
    pub(crate) fn abandon_in_flight(&mut self) -> Option<u32> {
        let seq = self.in_flight.take()?;
        self.fed -= 1;
        Some(seq)
    }

    pub(crate) fn push_record(&mut self, annotation: CombinedAnnotation) {
        self.dataset.push(annotation);
    }

    pub(crate) fn push_gap(&mut self, seq: u32) {
        self.gaps.push(seq);
    }

    /// Hand the dataset over to persistence
    pub(crate) fn take_dataset(&mut self) -> SessionDataset {
        std::mem::take(&mut self.dataset)
    }
}

/// Events emitted by the controller
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayEvent {
    /// A session was loaded with this many frames
    SessionLoaded { session: String, frames: usize },
    /// A recording could not be loaded
    SessionSkipped { session: String, reason: String },
    /// The active session ran out of frames
    SessionDrained { session: String },
    /// The active session was persisted
    SessionFlushed { session: String },
    /// Every discovered session has been handled
    AllSessionsProcessed,
}
