//! Dual-service dispatcher
//!
//! Sends each frame to the hand and pose services at the same time, then
//! collects the results in a fixed order (hands, then pose) and merges them
//! into one `CombinedAnnotation`. Every request is bounded by a deadline;
//! a frame whose request fails or expires is dropped, never retried.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::slot::FrameSlot;
use crate::detection::{DetectionError, DetectionResult, HandDetector, PoseDetector};
use crate::model::{CombinedAnnotation, ImageFrame};

/// Result of dispatching one frame
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Both services answered
    Annotated {
        seq: u32,
        annotation: CombinedAnnotation,
    },
    /// At least one service failed or timed out
    Dropped { seq: u32, reason: String },
}

impl FrameOutcome {
    pub fn seq(&self) -> u32 {
        match self {
            FrameOutcome::Annotated { seq, .. } | FrameOutcome::Dropped { seq, .. } => *seq,
        }
    }
}

/// Clears the busy flag when a dispatch ends, however it ends
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns the one-frame-in-flight rule for both detection services
pub struct Dispatcher {
    hands: Arc<dyn HandDetector>,
    pose: Arc<dyn PoseDetector>,
    request_timeout: Duration,
    busy: AtomicBool,
}

impl Dispatcher {
    pub fn new(
        hands: Arc<dyn HandDetector>,
        pose: Arc<dyn PoseDetector>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            hands,
            pose,
            request_timeout,
            busy: AtomicBool::new(false),
        }
    }

    /// Wait until both services accept requests (hands first)
    pub async fn wait_until_ready(&self) -> DetectionResult<()> {
        self.hands.wait_until_ready().await?;
        self.pose.wait_until_ready().await?;
        Ok(())
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Run one frame through both services
    ///
    /// Must not be called while another dispatch is running.
    pub async fn dispatch(&self, frame: ImageFrame) -> FrameOutcome {
        let was_busy = self.busy.swap(true, Ordering::AcqRel);
        debug_assert!(!was_busy, "dispatch while a frame is already in flight");
        if was_busy {
            tracing::error!("Frame {} dispatched while another frame is in flight", frame.seq);
        }
        let _guard = InFlightGuard(&self.busy);

        let seq = frame.seq;
        let frame = Arc::new(frame);
        let deadline = Instant::now() + self.request_timeout;

        let hands_task = {
            let hands = Arc::clone(&self.hands);
            let frame = Arc::clone(&frame);
            tokio::spawn(async move { hands.detect_hands(&frame).await })
        };
        let pose_task = {
            let pose = Arc::clone(&self.pose);
            let frame = Arc::clone(&frame);
            tokio::spawn(async move { pose.detect_pose(&frame).await })
        };

        // Fixed retrieval order: an early pose result waits in its task.
        let hands = self.collect(hands_task, deadline).await;
        let pose = self.collect(pose_task, deadline).await;

        match (hands, pose) {
            (Ok(hands), Ok(pose)) => {
                tracing::trace!(
                    "Frame {}: {} hand(s), pose {}",
                    seq,
                    hands.len(),
                    if pose.is_some() { "detected" } else { "absent" }
                );
                FrameOutcome::Annotated {
                    seq,
                    annotation: CombinedAnnotation::new(hands, pose),
                }
            }
            (Err(e), _) => {
                tracing::warn!("Dropping frame {}: hands request failed: {}", seq, e);
                FrameOutcome::Dropped {
                    seq,
                    reason: format!("hands: {}", e),
                }
            }
            (_, Err(e)) => {
                tracing::warn!("Dropping frame {}: pose request failed: {}", seq, e);
                FrameOutcome::Dropped {
                    seq,
                    reason: format!("pose: {}", e),
                }
            }
        }
    }

    async fn collect<T>(
        &self,
        mut task: JoinHandle<DetectionResult<T>>,
        deadline: Instant,
    ) -> DetectionResult<T> {
        match tokio::time::timeout_at(deadline, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(DetectionError::Task(e.to_string())),
            Err(_) => {
                task.abort();
                Err(DetectionError::Timeout(self.request_timeout.as_millis() as u64))
            }
        }
    }

    /// Take the pending frame, if any, and dispatch it
    ///
    /// Returns `None` when there is nothing to do this tick.
    pub async fn poll_once(&self, slot: &FrameSlot) -> Option<FrameOutcome> {
        let frame = slot.begin_dispatch()?;
        Some(self.dispatch(frame).await)
    }

    /// Fixed-rate polling loop feeding outcomes into `outcomes`
    ///
    /// Cancellation is observed between ticks only, so a frame taken from
    /// the slot always produces an outcome before the loop exits.
    pub async fn run(
        self: Arc<Self>,
        slot: Arc<FrameSlot>,
        outcomes: mpsc::Sender<FrameOutcome>,
        poll_interval: Duration,
        shutdown: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!("Dispatcher polling every {:?}", poll_interval);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let Some(outcome) = self.poll_once(&slot).await else {
                continue;
            };

            let delivered = outcomes.send(outcome).await;
            slot.finish_dispatch();

            if delivered.is_err() {
                tracing::warn!("Result receiver closed, stopping dispatcher");
                break;
            }
        }

        tracing::debug!("Dispatcher stopped");
    }
}
