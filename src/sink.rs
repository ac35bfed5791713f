//! Result aggregator and session sink
//!
//! Appends each frame outcome to the active session in delivery order and
//! persists the finished dataset as one JSON artifact per session.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::dispatch::FrameOutcome;
use crate::model::SessionDataset;
use crate::recording::SessionId;
use crate::replay::SessionContext;
use crate::utils::error::{ErrorReport, PipelineError};
use crate::utils::fs::write_json_atomic;

/// Persisting a session artifact failed
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn write_artifact(path: &Path, dataset: &SessionDataset) -> Result<(), SinkError> {
    write_json_atomic(path, dataset).map_err(|source| SinkError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Final status of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Every frame was replayed and the artifact written
    Flushed,
    /// Replay was interrupted; the artifact holds what was collected
    Partial,
    /// The recording could not be loaded
    Skipped,
    /// The artifact could not be written
    Failed,
}

/// Outcome of one session, for the run summary
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub session: String,
    pub status: SessionStatus,
    pub frames_total: usize,
    pub frames_fed: usize,
    pub records_written: usize,
    pub gaps: Vec<u32>,
    pub artifact: Option<PathBuf>,
    pub error: Option<ErrorReport>,
}

impl SessionReport {
    /// Report for a recording that never loaded
    pub fn skipped(id: &SessionId, error: &PipelineError) -> Self {
        Self {
            session: id.to_string(),
            status: SessionStatus::Skipped,
            frames_total: 0,
            frames_fed: 0,
            records_written: 0,
            gaps: Vec::new(),
            artifact: None,
            error: Some(ErrorReport::from(error)),
        }
    }
}

/// Collects annotations and writes session artifacts
pub struct SessionSink {
    output_dir: PathBuf,
    retry_backoff: Duration,
}

impl SessionSink {
    pub fn new(output_dir: impl Into<PathBuf>, retry_backoff: Duration) -> Self {
        Self {
            output_dir: output_dir.into(),
            retry_backoff,
        }
    }

    /// Where the artifact of `id` goes
    pub fn artifact_path(&self, id: &SessionId) -> PathBuf {
        self.output_dir.join(id.artifact_name())
    }

    /// Append one outcome to the active session
    ///
    /// Dropped frames leave no record; their sequence numbers are kept as
    /// gaps. Returns the sequence number to acknowledge.
    pub fn record(&self, ctx: &mut SessionContext, outcome: FrameOutcome) -> u32 {
        match outcome {
            FrameOutcome::Annotated { seq, annotation } => {
                ctx.push_record(annotation);
                seq
            }
            FrameOutcome::Dropped { seq, reason } => {
                tracing::warn!("Frame {} of {} left out of the dataset: {}", seq, ctx.id, reason);
                ctx.push_gap(seq);
                seq
            }
        }
    }

    /// Persist the session's dataset and consume the context
    ///
    /// The write is atomic. A failed write is retried once after the
    /// backoff; if that fails too the session is reported as failed.
    pub async fn flush(&self, mut ctx: SessionContext, interrupted: bool) -> SessionReport {
        let dataset = ctx.take_dataset();
        let path = self.artifact_path(&ctx.id);
        let records = dataset.len();

        tracing::info!("Saving {} ({} record(s)) to {:?}", ctx.id, records, path);

        let mut result = write_artifact(&path, &dataset);
        if let Err(e) = &result {
            tracing::warn!(
                "Writing {:?} failed ({}), retrying in {:?}",
                path,
                e,
                self.retry_backoff
            );
            tokio::time::sleep(self.retry_backoff).await;
            result = write_artifact(&path, &dataset);
        }

        let (status, artifact, error) = match result {
            Ok(()) if interrupted => (SessionStatus::Partial, Some(path), None),
            Ok(()) => (SessionStatus::Flushed, Some(path), None),
            Err(e) => {
                tracing::error!("Giving up on {}: {}", ctx.id, e);
                let error = PipelineError::from(e);
                (SessionStatus::Failed, None, Some(ErrorReport::from(&error)))
            }
        };

        if !ctx.gaps().is_empty() {
            tracing::info!("{} frame(s) of {} missing from its dataset", ctx.gaps().len(), ctx.id);
        }

        SessionReport {
            session: ctx.id.to_string(),
            status,
            frames_total: ctx.total_frames(),
            frames_fed: ctx.frames_fed(),
            records_written: if status == SessionStatus::Failed { 0 } else { records },
            gaps: ctx.gaps().to_vec(),
            artifact,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CombinedAnnotation;
    use std::fs;
    use tempfile::tempdir;

    fn context(name: &str) -> SessionContext {
        SessionContext::new(SessionId::parse(name), PathBuf::from(name), Vec::new())
    }

    #[tokio::test]
    async fn flush_writes_records_in_order() {
        let dir = tempdir().unwrap();
        let sink = SessionSink::new(dir.path(), Duration::from_millis(1));
        let mut ctx = context("bottle_joel_1.rec");

        assert_eq!(
            sink.record(&mut ctx, FrameOutcome::Annotated { seq: 1, annotation: CombinedAnnotation::default() }),
            1
        );
        assert_eq!(
            sink.record(&mut ctx, FrameOutcome::Dropped { seq: 2, reason: "timeout".into() }),
            2
        );
        sink.record(&mut ctx, FrameOutcome::Annotated { seq: 3, annotation: CombinedAnnotation::default() });

        let report = sink.flush(ctx, false).await;
        assert_eq!(report.status, SessionStatus::Flushed);
        assert_eq!(report.records_written, 2);
        assert_eq!(report.gaps, vec![2]);

        let text = fs::read_to_string(dir.path().join("bottle_joel_1.json")).unwrap();
        let dataset: SessionDataset = serde_json::from_str(&text).unwrap();
        assert_eq!(dataset.len(), 2);
    }

    #[tokio::test]
    async fn unwritable_artifact_is_reported_failed() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("cube_ana_1.json");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("occupied"), b"x").unwrap();

        let sink = SessionSink::new(dir.path(), Duration::from_millis(1));
        let report = sink.flush(context("cube_ana_1.rec"), false).await;

        assert_eq!(report.status, SessionStatus::Failed);
        assert!(report.artifact.is_none());
        assert_eq!(report.error.unwrap().code, "SINK_ERROR");
    }

    #[tokio::test]
    async fn write_succeeds_on_retry() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("cube_ana_3.json");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("occupied"), b"x").unwrap();

        // Clears the obstruction while the sink is backing off.
        let obstruction = target.clone();
        let cleaner = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            fs::remove_dir_all(&obstruction).unwrap();
        });

        let sink = SessionSink::new(dir.path(), Duration::from_millis(300));
        let mut ctx = context("cube_ana_3.rec");
        sink.record(&mut ctx, FrameOutcome::Annotated { seq: 1, annotation: CombinedAnnotation::default() });
        let report = sink.flush(ctx, false).await;
        cleaner.await.unwrap();

        assert_eq!(report.status, SessionStatus::Flushed);
        assert!(report.error.is_none());
        assert_eq!(report.artifact.as_deref(), Some(target.as_path()));
        assert_eq!(report.records_written, 1);

        let text = fs::read_to_string(&target).unwrap();
        let dataset: SessionDataset = serde_json::from_str(&text).unwrap();
        assert_eq!(dataset.len(), 1);
    }

    #[tokio::test]
    async fn interrupted_flush_is_partial() {
        let dir = tempdir().unwrap();
        let sink = SessionSink::new(dir.path(), Duration::from_millis(1));
        let report = sink.flush(context("cube_ana_2.rec"), true).await;

        assert_eq!(report.status, SessionStatus::Partial);
        assert_eq!(fs::read_to_string(dir.path().join("cube_ana_2.json")).unwrap(), "[]");
    }
}
