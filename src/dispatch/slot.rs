//! Single-slot frame intake
//!
//! The intake side overwrites the slot with the newest frame; the polling
//! loop takes it only when no dispatch is in flight. The pending frame and
//! the in-flight flag live under one mutex so take-and-mark is atomic.

use parking_lot::Mutex;

use crate::model::ImageFrame;

#[derive(Debug, Default)]
struct SlotState {
    pending: Option<ImageFrame>,
    in_flight: bool,
    overwritten: u64,
}

/// Holding area of capacity one with last-write-wins semantics
#[derive(Debug, Default)]
pub struct FrameSlot {
    state: Mutex<SlotState>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame`, discarding any frame not yet consumed
    ///
    /// Never blocks beyond the slot lock. Returns the discarded frame.
    pub fn offer(&self, frame: ImageFrame) -> Option<ImageFrame> {
        let mut state = self.state.lock();
        let replaced = state.pending.replace(frame);
        if replaced.is_some() {
            state.overwritten += 1;
        }
        replaced
    }

    /// Take the pending frame and mark it in flight
    ///
    /// Returns `None` while a dispatch is in flight or nothing is pending.
    pub fn begin_dispatch(&self) -> Option<ImageFrame> {
        let mut state = self.state.lock();
        if state.in_flight {
            return None;
        }
        let frame = state.pending.take()?;
        state.in_flight = true;
        Some(frame)
    }

    /// Clear the in-flight flag after the outcome was handed on
    pub fn finish_dispatch(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.in_flight, "finish_dispatch without a frame in flight");
        if !state.in_flight {
            tracing::error!("finish_dispatch called with no frame in flight");
        }
        state.in_flight = false;
    }

    pub fn is_in_flight(&self) -> bool {
        self.state.lock().in_flight
    }

    pub fn has_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }

    /// Number of frames discarded by overwrites so far
    pub fn overwritten(&self) -> u64 {
        self.state.lock().overwritten
    }
}
