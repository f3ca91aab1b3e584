//! Minimal pipeline: a simulated chain backend feeds three blocks through
//! two queues. The arbitrator and sweeper share a queue (the sweeper must
//! see the arbitrator's effects); the watchtower client is independent.
//!
//! Run with: `cargo run --example heartbeat`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::{blockdata::constants::genesis_block, Network};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use blockbeat::{
    Beat, BeatConsumer, BlockEpoch, BlockbeatDispatcher, Config, Consumer, ConsumerRef,
};

struct Watcher {
    beats: BeatConsumer,
}

#[async_trait]
impl Consumer for Watcher {
    fn name(&self) -> &str {
        self.beats.name()
    }

    async fn process_block(&self, beat: Beat) {
        self.beats.process_block(beat).await
    }
}

/// Spawns a subsystem event loop that "works" for a bit and acks each beat.
fn start_watcher(name: &'static str, quit: &CancellationToken, work: Duration) -> ConsumerRef {
    let (beats, mut beat_rx) = BeatConsumer::new(quit.clone(), name);
    let loop_quit = quit.clone();

    tokio::spawn(async move {
        while let Some(beat) = beat_rx.recv().await {
            tokio::time::sleep(work).await;
            info!(consumer = name, height = beat.height(), "processed block");
            beat.notify_block_processed(Ok(()), &loop_quit).await;
        }
    });

    Arc::new(Watcher { beats })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let quit = CancellationToken::new();
    let (epoch_tx, epoch_rx) = mpsc::channel(1);

    let mut dispatcher = BlockbeatDispatcher::new(epoch_rx, Config::default(), quit.clone());
    dispatcher.register_queue(vec![
        start_watcher("chain-arbitrator", &quit, Duration::from_millis(30)),
        start_watcher("sweeper", &quit, Duration::from_millis(20)),
    ])?;
    dispatcher.register_queue(vec![start_watcher(
        "watchtower-client",
        &quit,
        Duration::from_millis(10),
    )])?;

    // Simulated chain backend: three blocks, then the source closes and the
    // dispatcher exits on its own.
    tokio::spawn(async move {
        for height in 800_000..800_003 {
            let epoch = BlockEpoch::from_block(height, genesis_block(Network::Regtest));
            if epoch_tx.send(epoch).await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    });

    dispatcher.run().await?;
    Ok(())
}
