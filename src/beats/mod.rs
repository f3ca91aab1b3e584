//! # The beat: one block epoch plus its private acknowledgement slot.
//!
//! A [`Beat`] is the unit of broadcast in the pipeline. For every consumer
//! that must see a block, the dispatcher forks a fresh beat (same epoch, new
//! one-slot ack channel), hands it over, and waits on the matching
//! [`AckReceiver`].
//!
//! ## Architecture
//! ```text
//! BlockSource ──► BlockbeatDispatcher ──► Beat (per block)
//!                        │
//!                        ├──► queue 1 task ──► fork ► consumer A ─ack─┐
//!                        │                    fork ► consumer B ─ack─┤
//!                        ├──► queue 2 task ──► fork ► consumer C ─ack─┤
//!                        │                                           │
//!                        └──── next block only after every ack ◄─────┘
//! ```
//!
//! ## Rules
//! - Beats are never shared across consumers; [`Beat::fork`] is the only
//!   copy operation and always produces a fresh ack slot.
//! - Each ack channel has exactly one writer (the consumer) and one reader
//!   (the dispatcher), and carries at most one value.
//! - A beat is logically dead once its ack has been read.

mod beat;
mod dispatch;
mod scan;

pub use beat::{AckReceiver, Beat, BeatAck};
pub use scan::SpendDetail;
