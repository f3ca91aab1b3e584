//! # Error types used by the blockbeat pipeline.
//!
//! This module defines three error types:
//!
//! - [`DispatchError`] errors raised while driving a beat through consumers.
//!   Every variant is fatal to the pipeline: the embedding node is expected
//!   to shut down rather than drift out of sync with the chain.
//! - [`ConsumerError`] the opaque error a consumer reports through a beat's
//!   ack channel when it failed to process the block.
//! - [`ScanError`] errors raised by the block-scanning helpers. These are not
//!   fatal; the caller decides what a script mismatch means.
//!
//! All types provide `as_label` helpers for metrics.

use bitcoin::ScriptBuf;
use thiserror::Error;

/// # Errors produced while dispatching a beat.
///
/// Any of these surfacing from the dispatcher means a subsystem can no longer
/// be trusted to track on-chain state. There is no retry: a consumer that
/// fails is assumed to have corrupted chain-derived state and must be
/// restarted from cold.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DispatchError {
    /// A consumer failed to acknowledge the block within its budget. The
    /// subsystem is assumed deadlocked.
    #[error("consumer {consumer}: process block timeout")]
    ProcessBlockTimeout {
        /// Name of the silent consumer.
        consumer: String,
    },

    /// A consumer acknowledged the block with an error.
    #[error("{consumer}: ProcessBlock got: {source}")]
    ConsumerFailed {
        /// Name of the failing consumer.
        consumer: String,
        /// The error the consumer reported.
        #[source]
        source: ConsumerError,
    },

    /// A consumer dropped its beat without acknowledging it. Observable
    /// immediately, unlike a silent consumer which runs out the timeout.
    #[error("{consumer}: ack channel closed before the block was processed")]
    AckChannelClosed {
        /// Name of the consumer that dropped the beat.
        consumer: String,
    },

    /// A per-queue worker task died before reporting a result.
    #[error("queue worker panicked: {reason}")]
    QueueWorkerPanicked {
        /// Panic payload or join failure description.
        reason: String,
    },

    /// Attempted to register a consumer under a name that is already taken.
    /// Names key the per-consumer diagnostics, so they must be unique across
    /// all queues.
    #[error("consumer '{name}' is already registered")]
    DuplicateConsumer {
        /// The duplicate consumer name.
        name: String,
    },

    /// Attempted to register a queue with no consumers in it.
    #[error("a queue must contain at least one consumer")]
    EmptyQueue,
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::ProcessBlockTimeout { .. } => "dispatch_process_block_timeout",
            DispatchError::ConsumerFailed { .. } => "dispatch_consumer_failed",
            DispatchError::AckChannelClosed { .. } => "dispatch_ack_channel_closed",
            DispatchError::QueueWorkerPanicked { .. } => "dispatch_queue_worker_panicked",
            DispatchError::DuplicateConsumer { .. } => "dispatch_duplicate_consumer",
            DispatchError::EmptyQueue => "dispatch_empty_queue",
        }
    }

    /// Returns the name of the consumer this error is attributed to, if any.
    pub fn consumer(&self) -> Option<&str> {
        match self {
            DispatchError::ProcessBlockTimeout { consumer }
            | DispatchError::ConsumerFailed { consumer, .. }
            | DispatchError::AckChannelClosed { consumer } => Some(consumer),
            _ => None,
        }
    }
}

/// # Error reported by a consumer through a beat's ack channel.
///
/// The dispatcher treats the content as opaque; it only wraps it with the
/// consumer's name and shuts the pipeline down.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct ConsumerError {
    /// Human-readable description of what went wrong.
    reason: String,
}

impl ConsumerError {
    /// Creates a new consumer error with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Returns the reason string.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// # Errors produced by the block-scanning helpers.
///
/// Returned by
/// [`Beat::has_outpoint_spent_by_script`](crate::Beat::has_outpoint_spent_by_script).
/// Unlike [`DispatchError`] these are advisory: a mismatch signals a protocol
/// anomaly worth inspection, not a broken pipeline.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// The outpoint was spent, but by a script other than the one the caller
    /// asked about.
    #[error("pkscript mismatch: want {want}, got {got}")]
    PkScriptMismatch {
        /// The script the caller expected the spend to use.
        want: ScriptBuf,
        /// The script reconstructed from the spending input.
        got: ScriptBuf,
    },

    /// The spending input's script cannot be reconstructed from its witness
    /// or signature script.
    #[error("unable to reconstruct pkscript from the spending input")]
    UnsupportedScriptType,
}

impl ScanError {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            ScanError::PkScriptMismatch { .. } => "scan_pkscript_mismatch",
            ScanError::UnsupportedScriptType => "scan_unsupported_script_type",
        }
    }
}
