use std::sync::Arc;

use async_trait::async_trait;

use crate::beats::Beat;

/// Shared handle to a consumer.
///
/// This is the type queues are built from and what the dispatcher holds; the
/// subsystem itself stays owned by whoever created it.
pub type ConsumerRef = Arc<dyn Consumer>;

/// # A subsystem driven by the blockbeat.
///
/// The block chain is a state machine: every state change manifests in a
/// block. Implementors receive each new block as a [`Beat`] and must
/// acknowledge it on the beat's ack channel once their own state machine has
/// advanced, via
/// [`notify_block_processed`](crate::Beat::notify_block_processed).
///
/// `process_block` only covers *delivery*: it completes once the beat has
/// been handed to the subsystem, and the processing result arrives later
/// over the beat's ack channel. This is what lets a subsystem do arbitrarily
/// long work between receiving a beat and acknowledging it, bounded only by
/// the dispatcher's per-consumer timeout.
///
/// The preferred implementation delegates to an embedded
/// [`BeatConsumer`](crate::BeatConsumer), leaving only `name` to write.
/// Ad-hoc implementations are fine for simple consumers, as long as exactly
/// one ack is eventually published per beat.
#[async_trait]
pub trait Consumer: Send + Sync + 'static {
    /// Returns a stable, human-readable name for this subsystem. Names must
    /// be unique across all registered queues.
    fn name(&self) -> &str;

    /// Accepts delivery of a new beat.
    ///
    /// Silence past the dispatcher's timeout after this returns is treated
    /// as a deadlocked subsystem and shuts the pipeline down.
    async fn process_block(&self, beat: Beat);
}
