use anyhow::Context;
use clap::Parser;
use filemesh::{init_logging, Peer, PeerArgs};
use tokio::sync::watch;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = PeerArgs::parse();
    init_logging();

    let peer = Peer::bind(args.config())
        .await
        .context("starting peer")?;

    let (stop, shutdown) = watch::channel(false);
    let running = tokio::spawn(peer.run(shutdown));

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    info!("shutting down");
    let _ = stop.send(true);
    running.await.context("peer task failed")?;
    Ok(())
}
