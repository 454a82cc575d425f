use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use filemesh::tracker::{self, TrackerState};
use filemesh::{init_logging, TrackerArgs};
use tokio::sync::watch;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = TrackerArgs::parse();
    init_logging();

    let config = args.config();
    let listener = tracker::bind(args.addr())
        .await
        .context("starting tracker")?;
    let state = Arc::new(TrackerState::new(config.merge_policy));

    let (stop, shutdown) = watch::channel(false);
    let service = tokio::spawn(tracker::run(listener, state, config, shutdown));

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    info!("shutting down");
    let _ = stop.send(true);
    service.await.context("tracker task failed")?;
    Ok(())
}
