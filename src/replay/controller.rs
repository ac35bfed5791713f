//! Session replay controller
//!
//! Walks the discovered recordings one at a time, feeds their frames to the
//! dispatcher one by one and only moves on after each acknowledgment.

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

use super::state::{ReplayEvent, ReplayState, SessionContext};
use crate::recording::{self, SessionFilter, SessionId, SessionLoadError, SessionRecording};
use crate::transport::FramePublisher;

/// What happened when the controller tried to feed a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStep {
    /// A frame was published and is now awaiting acknowledgment
    Dispatched { seq: u32 },
    /// The frame queue is empty; the session must be flushed
    Drained,
}

/// Result of asking for the next session
#[derive(Debug)]
pub enum LoadStep {
    Loaded(SessionContext),
    Exhausted,
}

/// Drives session-by-session replay
pub struct ReplayController {
    /// Current replay state
    state: Arc<RwLock<ReplayState>>,

    /// Sessions not yet loaded, in processing order
    pending: VecDeque<SessionRecording>,

    /// Where frames are published
    publisher: FramePublisher,

    /// Sessions that failed to load
    skipped: Vec<(SessionId, SessionLoadError)>,

    /// Event broadcaster
    event_tx: broadcast::Sender<ReplayEvent>,
}

impl ReplayController {
    /// Create a controller over an explicit, already ordered session list
    pub fn new(recordings: Vec<SessionRecording>, publisher: FramePublisher) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(ReplayState::Idle)),
            pending: recordings.into(),
            publisher,
            skipped: Vec::new(),
            event_tx,
        }
    }

    /// Enumerate `input_dir` once and build a controller over the result
    pub fn discover(
        input_dir: &Path,
        extension: &str,
        filter: &SessionFilter,
        publisher: FramePublisher,
    ) -> io::Result<Self> {
        let recordings = recording::discover_sessions(input_dir, extension, filter)?;
        Ok(Self::new(recordings, publisher))
    }

    /// Get the current replay state
    pub fn state(&self) -> ReplayState {
        *self.state.read()
    }

    /// Subscribe to replay events
    pub fn subscribe(&self) -> broadcast::Receiver<ReplayEvent> {
        self.event_tx.subscribe()
    }

    /// Sessions still waiting to be loaded
    pub fn sessions_remaining(&self) -> usize {
        self.pending.len()
    }

    /// Drain the list of sessions skipped since the last call
    pub fn take_skipped(&mut self) -> Vec<(SessionId, SessionLoadError)> {
        std::mem::take(&mut self.skipped)
    }

    fn set_state(&self, state: ReplayState) {
        *self.state.write() = state;
    }

    fn emit(&self, event: ReplayEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Load the next session that can be read
    ///
    /// Unreadable recordings are logged and skipped. Once the list is empty
    /// the controller stays `Exhausted`: every further call only repeats the
    /// "all sessions processed" signal.
    pub fn load_next(&mut self) -> LoadStep {
        if self.state() == ReplayState::Exhausted {
            tracing::info!("All session recordings processed");
            self.emit(ReplayEvent::AllSessionsProcessed);
            return LoadStep::Exhausted;
        }

        while let Some(recording) = self.pending.pop_front() {
            self.set_state(ReplayState::Loading);
            tracing::info!("Loading session {}", recording.id);

            match recording::load_frames(&recording.path) {
                Ok(frames) => {
                    tracing::info!("Session {} has {} frame(s)", recording.id, frames.len());
                    self.emit(ReplayEvent::SessionLoaded {
                        session: recording.id.to_string(),
                        frames: frames.len(),
                    });
                    self.set_state(ReplayState::Streaming);
                    return LoadStep::Loaded(SessionContext::new(
                        recording.id,
                        recording.path,
                        frames,
                    ));
                }
                Err(e) => {
                    tracing::error!("Skipping session {}: {}", recording.id, e);
                    self.emit(ReplayEvent::SessionSkipped {
                        session: recording.id.to_string(),
                        reason: e.to_string(),
                    });
                    self.skipped.push((recording.id, e));
                }
            }
        }

        self.set_state(ReplayState::Exhausted);
        tracing::info!("All session recordings processed");
        self.emit(ReplayEvent::AllSessionsProcessed);
        LoadStep::Exhausted
    }

    /// Publish the head of the frame queue
    ///
    /// Frames that reach no subscriber are recorded as gaps and the next
    /// frame is tried, so the session can never stall on a lost publish.
    pub fn stream_next(&mut self, ctx: &mut SessionContext) -> StreamStep {
        debug_assert!(ctx.in_flight.is_none(), "frame published while another is in flight");
        if let Some(seq) = ctx.in_flight {
            tracing::error!("Frame {} still in flight, refusing to publish", seq);
            return StreamStep::Dispatched { seq };
        }

        while let Some(frame) = ctx.frames.pop_front() {
            let seq = frame.seq;
            if self.publisher.publish(frame) == 0 {
                tracing::error!(
                    "Frame {} of {} published on {} with no subscriber",
                    seq,
                    ctx.id,
                    self.publisher.topic()
                );
                ctx.push_gap(seq);
                continue;
            }

            ctx.mark_fed(seq);
            return StreamStep::Dispatched { seq };
        }

        self.set_state(ReplayState::Draining);
        tracing::debug!("Session {} drained after {} frame(s)", ctx.id, ctx.frames_fed());
        self.emit(ReplayEvent::SessionDrained {
            session: ctx.id.to_string(),
        });
        StreamStep::Drained
    }

    /// The sink recorded the outcome of frame `seq`
    pub fn on_frame_acknowledged(&mut self, ctx: &mut SessionContext, seq: u32) -> StreamStep {
        match ctx.in_flight.take() {
            Some(expected) if expected == seq => {}
            other => {
                debug_assert!(false, "acknowledged frame {} but {:?} was in flight", seq, other);
                tracing::error!(
                    "Acknowledged frame {} of {} but {:?} was in flight",
                    seq,
                    ctx.id,
                    other
                );
            }
        }
        self.stream_next(ctx)
    }

    /// Stop feeding the active session (shutdown)
    pub fn halt(&mut self, ctx: &SessionContext) {
        tracing::info!(
            "Halting replay of {} with {} frame(s) left",
            ctx.id,
            ctx.frames_remaining()
        );
        self.set_state(ReplayState::Draining);
    }

    /// The active session has been persisted (or given up on)
    pub fn on_session_flushed(&mut self, id: &SessionId) {
        self.set_state(ReplayState::Done);
        self.emit(ReplayEvent::SessionFlushed {
            session: id.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::FrameBus;
    use std::fs;
    use tempfile::tempdir;

    fn image_line(seq: u32, secs: u32) -> String {
        format!(
            r#"{{"topic":"/cam","header":{{"seq":{seq},"stamp":{{"secs":{secs},"nsecs":0}}}},"payload":{{"type":"image","width":1,"height":1,"encoding":"mono8","data":[0]}}}}"#
        )
    }

    fn write_session(dir: &Path, name: &str, stamps: &[(u32, u32)]) {
        let body: Vec<String> = stamps.iter().map(|(seq, secs)| image_line(*seq, *secs)).collect();
        fs::write(dir.join(name), body.join("\n")).unwrap();
    }

    #[test]
    fn feeds_frames_in_timestamp_order_one_at_a_time() {
        let dir = tempdir().unwrap();
        write_session(dir.path(), "cube_joel_1.rec", &[(2, 20), (1, 10), (3, 30)]);

        let bus = FrameBus::new();
        let slot = bus.subscribe("img");
        let mut controller =
            ReplayController::discover(dir.path(), "rec", &SessionFilter::default(), bus.publisher("img"))
                .unwrap();
        assert_eq!(controller.state(), ReplayState::Idle);

        let LoadStep::Loaded(mut ctx) = controller.load_next() else {
            panic!("session should load");
        };
        assert_eq!(controller.state(), ReplayState::Streaming);

        let mut order = Vec::new();
        let mut step = controller.stream_next(&mut ctx);
        while let StreamStep::Dispatched { seq } = step {
            let frame = slot.begin_dispatch().unwrap();
            assert_eq!(frame.seq, seq);
            assert!(!slot.has_pending());
            slot.finish_dispatch();
            order.push(seq);
            step = controller.on_frame_acknowledged(&mut ctx, seq);
        }

        assert_eq!(order, vec![1, 2, 3]);
        assert_eq!(ctx.frames_fed(), 3);
        assert_eq!(controller.state(), ReplayState::Draining);
    }

    #[test]
    fn unreadable_session_is_skipped() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a_b_1.rec"), "garbage").unwrap();
        write_session(dir.path(), "a_b_2.rec", &[(1, 1)]);

        let bus = FrameBus::new();
        let _slot = bus.subscribe("img");
        let mut controller =
            ReplayController::discover(dir.path(), "rec", &SessionFilter::default(), bus.publisher("img"))
                .unwrap();

        let LoadStep::Loaded(ctx) = controller.load_next() else {
            panic!("second session should load");
        };
        assert_eq!(ctx.id.file_name, "a_b_2.rec");

        let skipped = controller.take_skipped();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].0.file_name, "a_b_1.rec");
    }

    #[test]
    fn exhausted_controller_is_idempotent() {
        let bus = FrameBus::new();
        let slot = bus.subscribe("img");
        let mut controller = ReplayController::new(Vec::new(), bus.publisher("img"));
        let mut events = controller.subscribe();

        for _ in 0..3 {
            assert!(matches!(controller.load_next(), LoadStep::Exhausted));
            assert_eq!(controller.state(), ReplayState::Exhausted);
        }

        for _ in 0..3 {
            assert_eq!(events.try_recv().unwrap(), ReplayEvent::AllSessionsProcessed);
        }
        assert!(events.try_recv().is_err());
        assert!(!slot.has_pending());
    }

    #[test]
    fn empty_session_drains_immediately() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("x_y_1.rec"), "").unwrap();

        let bus = FrameBus::new();
        let _slot = bus.subscribe("img");
        let mut controller =
            ReplayController::discover(dir.path(), "rec", &SessionFilter::default(), bus.publisher("img"))
                .unwrap();

        let LoadStep::Loaded(mut ctx) = controller.load_next() else {
            panic!("empty session still loads");
        };
        assert_eq!(controller.stream_next(&mut ctx), StreamStep::Drained);
        assert_eq!(controller.state(), ReplayState::Draining);
    }

    #[test]
    fn frames_without_subscriber_become_gaps() {
        let dir = tempdir().unwrap();
        write_session(dir.path(), "x_y_1.rec", &[(1, 1), (2, 2)]);

        let bus = FrameBus::new();
        let mut controller =
            ReplayController::discover(dir.path(), "rec", &SessionFilter::default(), bus.publisher("img"))
                .unwrap();

        let LoadStep::Loaded(mut ctx) = controller.load_next() else {
            panic!("session should load");
        };
        assert_eq!(controller.stream_next(&mut ctx), StreamStep::Drained);
        assert_eq!(ctx.gaps(), &[1, 2]);
        assert_eq!(ctx.frames_fed(), 0);
    }
}
