use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::{chain::BlockEpoch, error::ConsumerError};

/// Result a consumer reports for one processed block.
pub type BeatAck = Result<(), ConsumerError>;

/// Receive half of a beat's ack channel. Yields the single [`BeatAck`] the
/// consumer publishes, or `None` if the beat was dropped unacknowledged.
pub type AckReceiver = mpsc::Receiver<BeatAck>;

/// One block epoch on its way to one consumer.
///
/// Carries the epoch and the send half of a private one-slot ack channel.
/// The channel is buffered to depth 1 so an acknowledging consumer is never
/// blocked by a slow reader.
///
/// `Beat` is deliberately not `Clone`: two beats must never share an ack
/// slot. Use [`Beat::fork`] to produce a copy for another consumer.
#[derive(Debug)]
pub struct Beat {
    /// The block epoch this beat announces.
    epoch: BlockEpoch,

    /// Send half of the ack channel. The matching [`AckReceiver`] is handed
    /// out at construction and retained by whoever dispatched the beat.
    ack_tx: mpsc::Sender<BeatAck>,
}

impl Beat {
    /// Creates a beat for the given epoch together with the receive half of
    /// its fresh ack channel.
    pub fn new(epoch: BlockEpoch) -> (Self, AckReceiver) {
        let (ack_tx, ack_rx) = mpsc::channel(1);
        (Self { epoch, ack_tx }, ack_rx)
    }

    /// Forks a copy of this beat: same epoch, fresh one-slot ack channel.
    ///
    /// Every delivery to a consumer goes through a fork, which is what keeps
    /// concurrent consumers isolated from each other.
    #[must_use]
    pub fn fork(&self) -> (Self, AckReceiver) {
        Self::new(self.epoch.clone())
    }

    /// Returns the height of the block epoch.
    pub fn height(&self) -> i32 {
        self.epoch.height
    }

    /// Returns the block epoch this beat announces.
    pub fn epoch(&self) -> &BlockEpoch {
        &self.epoch
    }

    /// Signals the dispatcher that this block has been processed.
    ///
    /// Publishes `ack` on the beat's ack channel, or returns early when
    /// `quit` fires first. Must be called exactly once per beat; a second
    /// call finds the slot occupied and simply parks until quit.
    ///
    /// Extreme caution must be taken when acknowledging with an error, as it
    /// shuts down the whole pipeline.
    pub async fn notify_block_processed(&self, ack: BeatAck, quit: &CancellationToken) {
        tokio::select! {
            // Prefer delivering the ack whenever the slot has room; quit
            // only preempts a send that would otherwise block.
            biased;

            res = self.ack_tx.send(ack) => {
                if res.is_err() {
                    trace!(height = self.height(), "dispatcher stopped waiting for ack");
                }
            }
            _ = quit.cancelled() => {
                trace!(height = self.height(), "ack abandoned on shutdown");
            }
        }
    }

    /// Best-effort ack used on the shutdown path: fills the slot if it is
    /// still empty so the dispatcher does not hang, never blocks.
    pub(crate) fn try_ack(&self, ack: BeatAck) {
        let _ = self.ack_tx.try_send(ack);
    }
}
