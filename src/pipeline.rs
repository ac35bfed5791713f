//! Replay pipeline
//!
//! Wires the replay controller, the frame bus, the dispatcher and the sink
//! together and runs every discovered session to completion, one at a time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::{ConfigError, PipelineConfig};
use crate::detection::{HandDetector, PoseDetector};
use crate::dispatch::{Dispatcher, FrameOutcome, FrameSlot};
use crate::replay::{LoadStep, ReplayController, ReplayEvent, ReplayState, StreamStep};
use crate::sink::{SessionReport, SessionSink, SessionStatus};
use crate::transport::FrameBus;
use crate::utils::error::{PipelineError, PipelineResult};
use crate::utils::fs::write_json_atomic;

/// Result of a whole run
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// True when shutdown cut the run short
    pub interrupted: bool,
    pub sessions: Vec<SessionReport>,
}

impl RunSummary {
    pub fn count(&self, status: SessionStatus) -> usize {
        self.sessions.iter().filter(|s| s.status == status).count()
    }

    /// Write the summary as JSON
    pub fn write(&self, path: &Path) -> PipelineResult<()> {
        write_json_atomic(path, self)?;
        Ok(())
    }
}

/// The whole replay-to-dataset pipeline
pub struct Pipeline {
    controller: ReplayController,
    dispatcher: Arc<Dispatcher>,
    slot: Arc<FrameSlot>,
    sink: SessionSink,
    poll_interval: Duration,
}

impl Pipeline {
    /// Validate the configuration, discover sessions and wire everything up
    pub fn new(
        config: &PipelineConfig,
        hands: Arc<dyn HandDetector>,
        pose: Arc<dyn PoseDetector>,
    ) -> PipelineResult<Self> {
        config.validate()?;

        let bus = FrameBus::new();
        let slot = bus.subscribe(&config.input_image_topic);
        let publisher = bus.publisher(&config.output_image_topic);

        let controller = ReplayController::discover(
            &config.input_dir,
            &config.recording_extension,
            &config.session_filter(),
            publisher,
        )
        .map_err(|source| ConfigError::Discovery {
            path: config.input_dir.clone(),
            source,
        })?;

        Ok(Self {
            controller,
            dispatcher: Arc::new(Dispatcher::new(hands, pose, config.request_timeout())),
            slot,
            sink: SessionSink::new(&config.output_dir, config.flush_retry_backoff()),
            poll_interval: config.poll_interval(),
        })
    }

    /// Sessions discovered and not yet processed
    pub fn sessions_remaining(&self) -> usize {
        self.controller.sessions_remaining()
    }

    pub fn state(&self) -> ReplayState {
        self.controller.state()
    }

    /// Subscribe to controller events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ReplayEvent> {
        self.controller.subscribe()
    }

    /// Block until both detection services are reachable
    pub async fn wait_until_ready(&self) -> PipelineResult<()> {
        self.dispatcher.wait_until_ready().await?;
        Ok(())
    }

    /// Replay every session until the list is exhausted or `shutdown` fires
    ///
    /// On shutdown no new frame is published; the frame already published is
    /// allowed to finish (or time out), and the partial dataset is flushed.
    pub async fn run(mut self, shutdown: CancellationToken) -> PipelineResult<RunSummary> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::info!(
            "Run {} started with {} session(s)",
            run_id,
            self.controller.sessions_remaining()
        );

        let (outcome_tx, mut outcome_rx) = mpsc::channel(1);
        // Stopped only once the session loop is done, so a frame still
        // waiting in the slot at shutdown is dispatched and recorded.
        let dispatcher_stop = CancellationToken::new();
        let worker = tokio::spawn(Arc::clone(&self.dispatcher).run(
            Arc::clone(&self.slot),
            outcome_tx,
            self.poll_interval,
            dispatcher_stop.clone(),
        ));

        let mut sessions = Vec::new();
        let result = self
            .replay_sessions(&mut outcome_rx, &shutdown, &mut sessions)
            .await;

        dispatcher_stop.cancel();
        drop(outcome_rx);
        if let Err(e) = worker.await {
            tracing::error!("Dispatcher task failed: {}", e);
        }

        let interrupted = result?;
        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            interrupted,
            sessions,
        };

        tracing::info!(
            "Run {} finished: {} flushed, {} partial, {} skipped, {} failed",
            run_id,
            summary.count(SessionStatus::Flushed),
            summary.count(SessionStatus::Partial),
            summary.count(SessionStatus::Skipped),
            summary.count(SessionStatus::Failed)
        );

        Ok(summary)
    }

    /// Returns whether the run was interrupted
    async fn replay_sessions(
        &mut self,
        outcomes: &mut mpsc::Receiver<FrameOutcome>,
        shutdown: &CancellationToken,
        reports: &mut Vec<SessionReport>,
    ) -> PipelineResult<bool> {
        loop {
            if shutdown.is_cancelled() {
                return Ok(true);
            }

            let step = self.controller.load_next();
            for (id, error) in self.controller.take_skipped() {
                reports.push(SessionReport::skipped(&id, &PipelineError::from(error)));
            }

            let mut ctx = match step {
                LoadStep::Loaded(ctx) => ctx,
                LoadStep::Exhausted => return Ok(false),
            };

            let mut interrupted = false;
            let mut step = self.controller.stream_next(&mut ctx);

            while let StreamStep::Dispatched { .. } = step {
                let received = tokio::select! {
                    outcome = outcomes.recv() => Some(outcome),
                    _ = shutdown.cancelled() => None,
                };

                let outcome = match received {
                    Some(outcome) => outcome,
                    None => {
                        interrupted = true;
                        self.controller.halt(&ctx);
                        // The dispatcher keeps polling until the loop ends, so
                        // the published frame still produces an outcome.
                        outcomes.recv().await
                    }
                };

                let Some(outcome) = outcome else {
                    if interrupted || shutdown.is_cancelled() {
                        if !interrupted {
                            interrupted = true;
                            self.controller.halt(&ctx);
                        }
                        if let Some(seq) = ctx.abandon_in_flight() {
                            tracing::debug!("Frame {} of {} was never dispatched", seq, ctx.id);
                        }
                        break;
                    }
                    return Err(PipelineError::DispatcherStopped);
                };

                let seq = self.sink.record(&mut ctx, outcome);

                if interrupted || shutdown.is_cancelled() {
                    if !interrupted {
                        interrupted = true;
                        self.controller.halt(&ctx);
                    }
                    break;
                }

                step = self.controller.on_frame_acknowledged(&mut ctx, seq);
            }

            let id = ctx.id.clone();
            let report = self.sink.flush(ctx, interrupted).await;
            self.controller.on_session_flushed(&id);
            reports.push(report);

            if interrupted {
                return Ok(true);
            }
        }
    }
}
