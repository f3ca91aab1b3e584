use async_trait::async_trait;
use tokio::sync::mpsc;

use super::BlockEpoch;

/// # Serial stream of block epochs.
///
/// The dispatcher pulls epochs one at a time and never asks for the next
/// until the previous one has been fully dispatched. Returning `None` means
/// the source is exhausted and the dispatcher exits cleanly.
///
/// Required semantics for implementors: heights are monotone non-decreasing
/// and at most one epoch is emitted per height. The dispatcher trusts the
/// source to expose only the canonical chain tip.
#[async_trait]
pub trait BlockSource: Send + 'static {
    /// Waits for the next block epoch, or `None` when the source is closed.
    async fn next_epoch(&mut self) -> Option<BlockEpoch>;
}

/// Any mpsc receiver of epochs is a source. This is the hand-off point
/// between a chain backend and the dispatcher, and what tests feed blocks
/// through.
#[async_trait]
impl BlockSource for mpsc::Receiver<BlockEpoch> {
    async fn next_epoch(&mut self) -> Option<BlockEpoch> {
        self.recv().await
    }
}
