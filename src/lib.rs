//! # blockbeat
//!
//! **Blockbeat** is an in-process fan-out bus that drives every
//! on-chain-aware subsystem of a node from a single logical clock: the block
//! chain. Each new best block becomes a *beat* that is delivered to every
//! registered consumer, and the next block is not accepted until every
//! consumer has acknowledged the previous one.
//!
//! ## Features
//!
//! | Area            | Description                                                          | Key types / traits          |
//! |-----------------|----------------------------------------------------------------------|-----------------------------|
//! | **Beats**       | One block epoch plus a private one-slot ack channel.                 | [`Beat`], [`BeatAck`]       |
//! | **Consumers**   | The contract a subsystem satisfies to receive beats.                 | [`Consumer`], [`ConsumerRef`] |
//! | **Adapter**     | Turns pushed beats into a channel the subsystem's event loop reads.  | [`BeatConsumer`]            |
//! | **Dispatch**    | Queue registry and two-tier fan-out per block.                       | [`BlockbeatDispatcher`]     |
//! | **Chain input** | Block epochs and the source that delivers them.                      | [`BlockEpoch`], [`BlockSource`] |
//! | **Spend scans** | Outpoint-spent queries over the announced block.                     | [`SpendDetail`]             |
//! | **Errors**      | Typed errors for dispatch and block scanning.                        | [`DispatchError`], [`ScanError`] |
//!
//! ## Scheduling model
//!
//! Consumers registered in the same queue are notified sequentially in
//! registration order; different queues are notified concurrently. Every
//! consumer has an independent timeout budget
//! ([`Config::process_block_timeout`]), and any consumer error or timeout
//! stops the whole pipeline: a subsystem that cannot keep up with the chain
//! must not be allowed to drift.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use tokio::sync::mpsc;
//! use tokio_util::sync::CancellationToken;
//!
//! use blockbeat::{
//!     Beat, BeatConsumer, BlockbeatDispatcher, Config, Consumer, ConsumerRef,
//! };
//!
//! /// A subsystem that reacts to new blocks.
//! struct Sweeper {
//!     beats: BeatConsumer,
//! }
//!
//! #[async_trait]
//! impl Consumer for Sweeper {
//!     fn name(&self) -> &str {
//!         self.beats.name()
//!     }
//!
//!     async fn process_block(&self, beat: Beat) {
//!         self.beats.process_block(beat).await
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let quit = CancellationToken::new();
//!
//!     // The subsystem embeds the adapter and reads beats in its own loop.
//!     let (beats, mut beat_rx) = BeatConsumer::new(quit.clone(), "sweeper");
//!     let sweeper: ConsumerRef = Arc::new(Sweeper { beats });
//!
//!     let loop_quit = quit.clone();
//!     tokio::spawn(async move {
//!         while let Some(beat) = beat_rx.recv().await {
//!             // Advance the subsystem's state machine for this block, then
//!             // acknowledge so the dispatcher can move on.
//!             beat.notify_block_processed(Ok(()), &loop_quit).await;
//!         }
//!     });
//!
//!     // Wire the dispatcher to a block source; any channel of epochs works.
//!     let (epoch_tx, epoch_rx) = mpsc::channel(1);
//!     let mut dispatcher = BlockbeatDispatcher::new(epoch_rx, Config::default(), quit);
//!     dispatcher.register_queue(vec![sweeper])?;
//!
//!     // Feed `epoch_tx` from the chain backend...
//!     # drop(epoch_tx);
//!     dispatcher.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ---

mod beats;
mod chain;
mod config;
mod consumers;
mod dispatcher;
mod error;

// ---- Public re-exports ----

pub use beats::{AckReceiver, Beat, BeatAck, SpendDetail};
pub use chain::{BlockEpoch, BlockSource};
pub use config::{Config, DEFAULT_PROCESS_BLOCK_TIMEOUT};
pub use consumers::{BeatConsumer, Consumer, ConsumerRef};
pub use dispatcher::BlockbeatDispatcher;
pub use error::{ConsumerError, DispatchError, ScanError};
