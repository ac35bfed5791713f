use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use landmark_replay::detection::{RemoteHandDetector, RemotePoseDetector};
use landmark_replay::{init_tracing, Pipeline, PipelineConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = PipelineConfig::parse();

    init_tracing();
    tracing::info!("Starting landmark-replay v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Configuration: {:?}", config);

    let hands = Arc::new(RemoteHandDetector::new(
        config.hands_endpoint.clone(),
        config.readiness_retry(),
    ));
    let pose = Arc::new(RemotePoseDetector::new(
        config.pose_endpoint.clone(),
        config.readiness_retry(),
    ));

    let pipeline = Pipeline::new(&config, hands, pose).context("invalid configuration")?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, finishing the current frame");
                shutdown.cancel();
            }
        });
    }

    tokio::select! {
        ready = pipeline.wait_until_ready() => ready.context("detection services unavailable")?,
        _ = shutdown.cancelled() => {
            tracing::info!("Stopped before the detection services became ready");
            return Ok(());
        }
    }

    let summary = pipeline.run(shutdown).await?;

    if let Some(path) = &config.summary_path {
        summary
            .write(path)
            .with_context(|| format!("writing run summary to {:?}", path))?;
        tracing::info!("Run summary written to {:?}", path);
    }

    Ok(())
}
