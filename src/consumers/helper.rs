//! # BeatConsumer: push-to-pull adapter for subsystem event loops.
//!
//! The dispatcher pushes beats; subsystems prefer to pull events from their
//! own loop. [`BeatConsumer`] bridges the two so the dispatcher appears as
//! one more input alongside whatever else the subsystem selects over.
//!
//! ## Per-beat state machine
//! ```text
//!   IDLE ──send to beat channel──► WAITING_ACK ──notify_block_processed──► DONE
//!     │                                  │
//!     └──quit fired──► DONE              └──quit fired──► DONE
//!         (ack'd with Ok)                    (no ack; the dispatcher's
//!                                             select saw quit too)
//! ```
//!
//! ## Rules
//! - The shutdown ack happens on the *send* path only. Acking on the
//!   ack-wait path would race the subsystem's real ack.
//! - `quit` must be the same token the owning subsystem shuts down with;
//!   otherwise a beat can be parked on a channel nobody reads.

use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{beats::Beat, chain::BlockEpoch};

/// Adapter that turns the dispatcher's "push a beat, wait for ack" into a
/// channel the owning subsystem reads in its own event loop.
///
/// Embed one per subsystem and delegate
/// [`Consumer::process_block`](crate::Consumer::process_block) to it; the
/// subsystem then only supplies its `name`.
pub struct BeatConsumer {
    /// Name of the subsystem embedding this helper.
    name: String,

    /// Hand-off channel to the subsystem's event loop. Capacity 1: the
    /// dispatcher never has more than one beat in flight per consumer.
    beat_tx: mpsc::Sender<Beat>,

    /// Shutdown token shared with the owning subsystem.
    quit: CancellationToken,

    /// Epoch of the latest delivered beat. Diagnostic only.
    current_epoch: Mutex<Option<BlockEpoch>>,
}

impl BeatConsumer {
    /// Creates the helper together with the receive half of the beat
    /// channel, which the owning subsystem reads in its event loop.
    ///
    /// `quit` must be the token the subsystem itself shuts down with.
    pub fn new(quit: CancellationToken, name: impl Into<String>) -> (Self, mpsc::Receiver<Beat>) {
        let (beat_tx, beat_rx) = mpsc::channel(1);

        let consumer = Self {
            name: name.into(),
            beat_tx,
            quit,
            current_epoch: Mutex::new(None),
        };

        (consumer, beat_rx)
    }

    /// Returns the name of the owning subsystem.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the epoch of the latest delivered beat, if any.
    pub fn current_epoch(&self) -> Option<BlockEpoch> {
        self.current_epoch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Hands the beat to the owning subsystem's event loop.
    ///
    /// If `quit` fires before the hand-off completes (or the loop is already
    /// gone), the beat is acknowledged with `Ok` on the spot so the
    /// dispatcher never deadlocks on a subsystem that is shutting down.
    pub async fn process_block(&self, beat: Beat) {
        self.set_current_epoch(&beat);

        tokio::select! {
            // Quit wins over a ready send, so shutdown is deterministic.
            biased;

            _ = self.quit.cancelled() => {
                debug!(consumer = %self.name, "received shutdown before handing off beat");
                beat.try_ack(Ok(()));
            }

            permit = self.beat_tx.reserve() => match permit {
                Ok(permit) => {
                    permit.send(beat);
                    trace!(consumer = %self.name, "sent blockbeat to subsystem");
                }
                Err(_) => {
                    debug!(consumer = %self.name, "subsystem loop gone, acking beat");
                    beat.try_ack(Ok(()));
                }
            },
        }
    }

    fn set_current_epoch(&self, beat: &Beat) {
        trace!(consumer = %self.name, height = beat.height(), "set current beat");
        *self
            .current_epoch
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(beat.epoch().clone());
    }
}
