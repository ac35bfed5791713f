//! Landmark Replay - labeled landmark datasets from recorded sessions.
//!
//! Replays the image stream of each session recording through a hand and a
//! pose landmark service, pairs their results per frame and writes one
//! ordered JSON dataset per session.

pub mod config;
pub mod detection;
pub mod dispatch;
pub mod model;
pub mod pipeline;
pub mod recording;
pub mod replay;
pub mod sink;
pub mod transport;
pub mod utils;

pub use config::PipelineConfig;
pub use pipeline::{Pipeline, RunSummary};
pub use utils::error::{PipelineError, PipelineResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "landmark_replay=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
